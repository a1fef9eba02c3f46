//! Channel messages and reactions

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::middleware::Access;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tandem_core::constants::clamp_limit;
use tandem_core::models::{
    MessageResponse, NewMessage, PageQuery, SendMessageRequest, ToggleReactionRequest,
};
use tandem_core::AppError;

/// Newest page of a channel, returned oldest first
#[utoipa::path(
    get,
    path = "/api/v1/channels/{id}/messages",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Channel ID"), PageQuery),
    responses(
        (status = 200, description = "Messages in chronological order", body = [MessageResponse]),
        (status = 403, description = "No read access", body = ErrorResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, access, query), fields(workspace_id = %access.workspace_id))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    access: Access,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = clamp_limit(query.limit, state.config.message_page_max);
    let offset = query.offset.unwrap_or(0).max(0);

    let messages = state
        .store
        .messages
        .list_messages(access.channel()?.id, limit, offset)
        .await?;
    let response: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(response))
}

/// Post a message; mentioned readers are notified
#[utoipa::path(
    post,
    path = "/api/v1/channels/{id}/messages",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Channel ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 403, description = "No access to the channel", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let channel = access.channel()?;
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidInput("Message cannot be blank".to_string()).into());
    }

    let message = state
        .store
        .messages
        .create_message(NewMessage {
            channel_id: channel.id,
            workspace_id: access.workspace_id,
            sender_id: ctx.user_id,
            content: content.to_string(),
            attachments: request.attachments,
        })
        .await?;

    state.broadcaster.message_received(&message).await;
    if let Err(e) = state
        .mentions
        .fan_out(channel, &message, &ctx.username)
        .await
    {
        tracing::warn!(error = %e, message_id = %message.id, "Mention fan-out failed");
    }

    tracing::debug!(message_id = %message.id, "Message sent");
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/{id}",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message", body = MessageResponse),
        (status = 403, description = "No read access", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(access), fields(workspace_id = %access.workspace_id))]
pub async fn get_message(access: Access) -> Result<impl IntoResponse, HttpAppError> {
    let message = access.message()?.clone();
    Ok(Json(MessageResponse::from(message)))
}

/// Add the caller's reaction, or remove it when already present
#[utoipa::path(
    put,
    path = "/api/v1/messages/{id}/reactions",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message ID")),
    request_body = ToggleReactionRequest,
    responses(
        (status = 200, description = "Reactions after the toggle", body = MessageResponse),
        (status = 403, description = "No read access", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn toggle_reaction(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<ToggleReactionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let emoji = request.emoji.trim();
    if emoji.is_empty() {
        return Err(AppError::InvalidInput("Emoji cannot be blank".to_string()).into());
    }

    let toggle = state
        .store
        .messages
        .toggle_reaction(access.message()?.id, emoji, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;

    state
        .broadcaster
        .reaction_updated(&toggle, emoji, ctx.user_id)
        .await;
    Ok(Json(MessageResponse::from(toggle.message)))
}

/// Delete a message. Only its sender may.
#[utoipa::path(
    delete,
    path = "/api/v1/messages/{id}",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 403, description = "Not the sender", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let message = access.message()?;
    if message.sender_id != ctx.user_id {
        return Err(AppError::forbidden("Only the sender can delete a message").into());
    }

    let deleted = state
        .store
        .messages
        .delete_message(message.id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;

    state.broadcaster.message_deleted(&deleted).await;
    Ok(StatusCode::NO_CONTENT)
}
