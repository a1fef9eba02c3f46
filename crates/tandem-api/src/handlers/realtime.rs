//! WebSocket endpoint
//!
//! The handshake is authenticated by `ws_auth_middleware` before this handler runs. After
//! the upgrade one task pumps both directions: client frames go to the [`Session`], queued
//! server events go out as JSON text frames.

use crate::auth::UserContext;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tandem_services::Session;
use uuid::Uuid;

#[tracing::instrument(skip(state, ws, ctx), fields(user_id = %ctx.user_id))]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state, ctx.user_id))
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let mut session = Session::new(state.store.clone(), state.connections.clone());
    let mut outbound = match session.authenticate(user_id).await {
        Ok(receiver) => receiver,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, "Realtime session refused");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = outbound.recv() => {
                // `None`: the registry dropped this connection (shutdown)
                let Some(event) = event else { break };
                let text = match serde_json::to_string(event.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, event = event.name(), "Failed to encode event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive failed");
                    break;
                }
            },
        }
    }

    session.close().await;
    let _ = sink.send(Message::Close(None)).await;
}
