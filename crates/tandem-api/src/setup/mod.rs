//! Application setup and initialization
//!
//! Builds the store, cache, services and router from [`Config`]. Tests skip
//! [`initialize_app`] and assemble an in-memory [`AppState`] before calling
//! [`routes::setup_routes`] directly.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tandem_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    tandem_infra::init_telemetry(&config.environment)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        store = ?config.store_backend,
        cache = ?config.cache_backend,
        "Configuration loaded and validated successfully"
    );

    let store = database::setup_store(&config).await?;

    let state = services::initialize_services(&config, store)?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
