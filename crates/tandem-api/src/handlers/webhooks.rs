//! Repository host webhook receiver

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tandem_core::constants::{WEBHOOK_EVENT_HEADER, WEBHOOK_SIGNATURE_HEADER};
use tandem_core::AppError;
use tandem_services::{verify_signature, RepositoryEventOutcome};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// `recorded` or `ignored`
    pub status: String,
}

/// Signed repository event. Unknown repositories are acknowledged and ignored.
#[utoipa::path(
    post,
    path = "/webhooks/repository",
    tag = "webhooks",
    request_body(content = Object, description = "Repository host event payload"),
    responses(
        (status = 202, description = "Event accepted", body = WebhookAck),
        (status = 401, description = "Missing or invalid signature", body = ErrorResponse),
        (status = 404, description = "Webhook ingestion not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn receive_repository_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let secret = state
        .config
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::not_found("Webhook ingestion is not configured"))?;

    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_string()))?;
    if !verify_signature(secret, &body, signature) {
        tracing::warn!("Rejected webhook with invalid signature");
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()).into());
    }

    let event = headers
        .get(WEBHOOK_EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let status = match state.repository_events.ingest(event, &body).await? {
        RepositoryEventOutcome::Ignored => "ignored",
        RepositoryEventOutcome::Recorded { .. } => "recorded",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAck {
            status: status.to_string(),
        }),
    ))
}
