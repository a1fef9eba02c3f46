//! Channel lifecycle and participation

use super::record_activity;
use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::middleware::Access;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tandem_core::models::{
    normalize_channel_name, ActivityKind, AddParticipantRequest, Channel, ChannelUpdate,
    CreateChannelRequest, NewChannel, NewNotification, NotificationTarget, NotificationType,
    UpdateChannelRequest,
};
use tandem_core::AppError;
use tandem_services::Room;
use uuid::Uuid;

fn channel_name(raw: &str) -> Result<String, AppError> {
    let name = normalize_channel_name(raw);
    if name.is_empty() {
        return Err(AppError::InvalidInput(
            "Channel name cannot be blank".to_string(),
        ));
    }
    Ok(name)
}

async fn require_member(state: &AppState, workspace_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    match state
        .store
        .workspaces
        .member_role(workspace_id, user_id)
        .await?
    {
        Some(_) => Ok(()),
        None => Err(AppError::InvalidInput(format!(
            "User {} is not a member of this workspace",
            user_id
        ))),
    }
}

/// Public channels plus the private ones the caller participates in
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{id}/channels",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Visible channels", body = [Channel]),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let channels = state
        .store
        .channels
        .list_visible_channels(access.workspace_id, ctx.user_id)
        .await?;
    Ok(Json(channels))
}

#[utoipa::path(
    post,
    path = "/api/v1/workspaces/{id}/channels",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = Channel),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Core role required", body = ErrorResponse),
        (status = 409, description = "Channel name taken", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<CreateChannelRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let name = channel_name(&request.name)?;
    for participant in &request.participants {
        require_member(&state, access.workspace_id, *participant).await?;
    }

    let channel = state
        .store
        .channels
        .create_channel(NewChannel {
            workspace_id: access.workspace_id,
            name,
            is_private: request.is_private,
            created_by: ctx.user_id,
            participants: request.participants,
        })
        .await?;

    record_activity(
        &state,
        access.workspace_id,
        ctx.user_id,
        ActivityKind::ChannelCreated,
        json!({ "channel_id": channel.id, "name": channel.name, "is_private": channel.is_private }),
    )
    .await;
    state.invalidate(access.workspace_id, ctx.user_id, []).await;
    state.broadcaster.channel_created(&channel).await;

    tracing::info!(channel_id = %channel.id, "Channel created");
    Ok((StatusCode::CREATED, Json(channel)))
}

/// Rename a channel or change its privacy. `general` is immutable.
#[utoipa::path(
    patch,
    path = "/api/v1/channels/{id}",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Channel ID")),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Channel updated", body = Channel),
        (status = 403, description = "Owner role required", body = ErrorResponse),
        (status = 409, description = "Immutable channel or name taken", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn update_channel(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<UpdateChannelRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let before = access.channel()?;
    let update = ChannelUpdate {
        name: request.name.as_deref().map(channel_name).transpose()?,
        is_private: request.is_private,
    };
    if update.name.is_none() && update.is_private.is_none() {
        return Err(AppError::InvalidInput("No fields to update".to_string()).into());
    }

    let channel = state
        .store
        .channels
        .update_channel(before.id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    state.invalidate(access.workspace_id, ctx.user_id, []).await;
    if channel.is_private && !before.is_private {
        // Connections joined while public rejoin through the participant check
        state
            .connections
            .close_room(&Room::channel(channel.workspace_id, channel.id))
            .await;

        let members: Vec<Uuid> = match state
            .store
            .workspaces
            .list_members(channel.workspace_id)
            .await
        {
            Ok(members) => members.into_iter().map(|m| m.user_id).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list members for privacy change");
                Vec::new()
            }
        };
        state
            .broadcaster
            .channel_made_private(&channel, &members)
            .await;
    } else {
        state.broadcaster.channel_updated(&channel).await;
    }

    Ok(Json(channel))
}

/// Delete a channel and its messages. `general` cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/v1/channels/{id}",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Channel ID")),
    responses(
        (status = 204, description = "Channel deleted"),
        (status = 403, description = "Owner role required", body = ErrorResponse),
        (status = 409, description = "Channel cannot be deleted", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let channel = state
        .store
        .channels
        .delete_channel(access.channel()?.id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    record_activity(
        &state,
        access.workspace_id,
        ctx.user_id,
        ActivityKind::ChannelDeleted,
        json!({ "channel_id": channel.id, "name": channel.name }),
    )
    .await;
    state.invalidate(access.workspace_id, ctx.user_id, []).await;
    state.broadcaster.channel_deleted(&channel).await;

    tracing::info!(channel_id = %channel.id, "Channel deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Self-join a public channel. Private channels need an explicit add.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{id}/join",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Joined", body = Channel),
        (status = 403, description = "Private channel", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn join_channel(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let channel = access.channel()?;
    if channel.is_private {
        return Err(AppError::forbidden(
            "Private channels can only be joined by invitation",
        )
        .into());
    }

    let channel = state
        .store
        .channels
        .add_participant(channel.id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    state.invalidate(access.workspace_id, ctx.user_id, []).await;
    state
        .broadcaster
        .user_joined_channel(&channel, ctx.user_id)
        .await;
    Ok(Json(channel))
}

#[utoipa::path(
    post,
    path = "/api/v1/channels/{id}/leave",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Left", body = Channel),
        (status = 403, description = "Not a participant of this private channel", body = ErrorResponse),
        (status = 409, description = "general cannot be left", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn leave_channel(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let current = access.channel()?;
    if !current.is_participant(ctx.user_id) {
        return Ok(Json(current.clone()));
    }

    let channel = state
        .store
        .channels
        .remove_participant(current.id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    state.invalidate(access.workspace_id, ctx.user_id, []).await;
    state
        .broadcaster
        .user_left_channel(&channel, ctx.user_id)
        .await;
    Ok(Json(channel))
}

/// Add a workspace member to a channel, the only way into a private one. On a private
/// channel the caller must already be a participant.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{id}/participants",
    tag = "channels",
    params(("id" = Uuid, Path, description = "Channel ID")),
    request_body = AddParticipantRequest,
    responses(
        (status = 200, description = "Participant added", body = Channel),
        (status = 400, description = "User is not a workspace member", body = ErrorResponse),
        (status = 403, description = "Core role and, for private channels, participation required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id, participant = %request.user_id))]
pub async fn add_participant(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<AddParticipantRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_member(&state, access.workspace_id, request.user_id).await?;
    let was_participant = access.channel()?.is_participant(request.user_id);

    let channel = state
        .store
        .channels
        .add_participant(access.channel()?.id, request.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    if was_participant {
        return Ok(Json(channel));
    }

    state
        .invalidate(access.workspace_id, ctx.user_id, [request.user_id])
        .await;
    state
        .broadcaster
        .user_joined_channel(&channel, request.user_id)
        .await;

    if request.user_id != ctx.user_id {
        if let Err(e) = state
            .notifications
            .notify(NewNotification {
                user_id: request.user_id,
                message: format!("@{} added you to #{}", ctx.username, channel.name),
                notification_type: NotificationType::Invite,
                repo_id: access.workspace_id,
                target_type: NotificationTarget::Channel,
                target_id: channel.id,
            })
            .await
        {
            tracing::warn!(error = %e, "Failed to notify new participant");
        }
    }

    Ok(Json(channel))
}

#[utoipa::path(
    delete,
    path = "/api/v1/channels/{id}/participants/{user_id}",
    tag = "channels",
    params(
        ("id" = Uuid, Path, description = "Channel ID"),
        ("user_id" = Uuid, Path, description = "Participant user ID")
    ),
    responses(
        (status = 200, description = "Participant removed", body = Channel),
        (status = 403, description = "Core role and, for private channels, participation required", body = ErrorResponse),
        (status = 409, description = "general cannot be left", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id, participant = %participant))]
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    Path((_channel_id, participant)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let channel = state
        .store
        .channels
        .remove_participant(access.channel()?.id, participant)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    state
        .invalidate(access.workspace_id, ctx.user_id, [participant])
        .await;
    state
        .broadcaster
        .user_left_channel(&channel, participant)
        .await;
    Ok(Json(channel))
}
