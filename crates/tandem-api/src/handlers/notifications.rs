use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tandem_core::constants::{clamp_limit, MAX_PAGE_LIMIT};
use tandem_core::models::{
    MarkAllReadResponse, Notification, NotificationListQuery, UnreadCountResponse,
};
use tandem_core::AppError;
use uuid::Uuid;

/// Caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(NotificationListQuery),
    responses(
        (status = 200, description = "Notifications", body = [Notification])
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    Query(query): Query<NotificationListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let notifications = state
        .store
        .notifications
        .list_notifications(
            ctx.user_id,
            query.unread.unwrap_or(false),
            clamp_limit(query.limit, MAX_PAGE_LIMIT),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "notifications",
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCountResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let count = state.store.notifications.unread_count(ctx.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{id}/read",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    // Someone else's notification looks exactly like a missing one
    let notification = state
        .store
        .notifications
        .mark_read(id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;
    Ok(Json(notification))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Number of notifications marked read", body = MarkAllReadResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let updated = state.store.notifications.mark_all_read(ctx.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
