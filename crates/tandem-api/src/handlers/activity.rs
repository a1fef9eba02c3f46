use crate::error::{ErrorResponse, HttpAppError};
use crate::middleware::Access;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tandem_core::constants::{clamp_limit, DEFAULT_ACTIVITY_LIMIT, MAX_PAGE_LIMIT};
use tandem_core::models::{ActivityEvent, PageQuery};

/// Workspace activity log, newest first
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{id}/activity",
    tag = "workspaces",
    params(("id" = Uuid, Path, description = "Workspace ID"), PageQuery),
    responses(
        (status = 200, description = "Activity entries", body = [ActivityEvent]),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, access, query), fields(workspace_id = %access.workspace_id))]
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    access: Access,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = clamp_limit(query.limit.or(Some(DEFAULT_ACTIVITY_LIMIT)), MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let entries = state
        .store
        .activity
        .list_activity(access.workspace_id, limit, offset)
        .await?;
    Ok(Json(entries))
}
