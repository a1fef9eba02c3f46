//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use tandem_core::Config;
use tandem_services::ConnectionManager;

/// Start the server with graceful shutdown
pub async fn start_server(config: &Config, app: Router, connections: ConnectionManager) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        message_page_max = config.message_page_max,
        ws_outbound_buffer = config.ws_outbound_buffer,
        webhooks = config.webhooks_enabled(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(connections))
        .await?;

    tandem_infra::shutdown_telemetry().await;
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then close every realtime connection so open sockets do
/// not hold the graceful shutdown open.
async fn shutdown_signal(connections: ConnectionManager) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
    connections.shutdown().await;
}
