//! Workspace import, listings and settings

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::middleware::Access;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tandem_core::models::{
    normalize_tags, CreateWorkspaceRequest, NewWorkspace, UpdateWorkspaceRequest, Workspace,
    WorkspaceSummary, WorkspaceUpdate,
};
use tandem_core::{AppError, CacheKey};
use tandem_services::parse_full_name;

/// Import a repository as a new workspace
#[utoipa::path(
    post,
    path = "/api/v1/workspaces",
    tag = "workspaces",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 201, description = "Workspace created", body = Workspace),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Repository not found", body = ErrorResponse),
        (status = 409, description = "Repository already imported", body = ErrorResponse),
        (status = 502, description = "Repository host unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, request), fields(user_id = %ctx.user_id, repository = %request.repository))]
pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    ValidatedJson(request): ValidatedJson<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (_, repo_name) = parse_full_name(&request.repository)?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(repo_name)
        .to_string();

    let repository = state.repo_host.fetch_repository(&request.repository).await?;
    let mut workspace = state
        .store
        .workspaces
        .create_workspace(NewWorkspace {
            owner_id: ctx.user_id,
            name,
            description: request.description,
            tags: normalize_tags(request.tags),
            repository,
        })
        .await?;

    // Committed; the webhook is best-effort from here on
    match state.repo_host.register_webhook(&workspace.repository).await {
        Ok(Some(webhook_id)) => {
            match state
                .store
                .workspaces
                .set_webhook_id(workspace.id, Some(webhook_id.clone()))
                .await
            {
                Ok(()) => workspace.repository.webhook_id = Some(webhook_id),
                Err(e) => tracing::warn!(error = %e, "Failed to store webhook id"),
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, workspace_id = %workspace.id, "Webhook registration failed")
        }
    }

    state.invalidate(workspace.id, ctx.user_id, []).await;

    tracing::info!(workspace_id = %workspace.id, "Workspace created");
    Ok((StatusCode::CREATED, Json(workspace.visible_to(ctx.user_id))))
}

/// Workspaces the caller belongs to
#[utoipa::path(
    get,
    path = "/api/v1/workspaces",
    tag = "workspaces",
    responses(
        (status = 200, description = "Active workspaces", body = [WorkspaceSummary])
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn list_active_workspaces(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let store = state.store.clone();
    let workspaces: Vec<WorkspaceSummary> = state
        .cache
        .get_or_compute(&CacheKey::active(ctx.user_id), None, || async move {
            store.workspaces.list_for_member(ctx.user_id).await
        })
        .await?;
    Ok(Json(workspaces))
}

/// Workspaces the caller could join
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/discover",
    tag = "workspaces",
    responses(
        (status = 200, description = "Discoverable workspaces", body = [WorkspaceSummary])
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn discover_workspaces(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let store = state.store.clone();
    let workspaces: Vec<WorkspaceSummary> = state
        .cache
        .get_or_compute(&CacheKey::discovery(ctx.user_id), None, || async move {
            store.workspaces.list_discoverable(ctx.user_id).await
        })
        .await?;
    Ok(Json(workspaces))
}

/// Full workspace document. The cached copy is shared by all members; private channels
/// are filtered for the caller after the lookup.
#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{id}",
    tag = "workspaces",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Workspace detail", body = Workspace),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let store = state.store.clone();
    let workspace_id = access.workspace_id;
    let workspace: Workspace = state
        .cache
        .get_or_compute(&CacheKey::detail(workspace_id), None, || async move {
            store
                .workspaces
                .get_workspace(workspace_id)
                .await?
                .ok_or_else(|| AppError::not_found("Workspace not found"))
        })
        .await?;
    Ok(Json(workspace.visible_to(ctx.user_id)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/workspaces/{id}",
    tag = "workspaces",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    request_body = UpdateWorkspaceRequest,
    responses(
        (status = 200, description = "Workspace updated", body = Workspace),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Owner role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn update_workspace(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<UpdateWorkspaceRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let update = WorkspaceUpdate::from(request);
    if update.is_empty() {
        return Err(AppError::InvalidInput("No fields to update".to_string()).into());
    }
    if update.name.as_deref() == Some("") {
        return Err(AppError::InvalidInput("Workspace name cannot be blank".to_string()).into());
    }

    let workspace = state
        .store
        .workspaces
        .update_workspace(access.workspace_id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Workspace not found"))?;

    state.invalidate(workspace.id, ctx.user_id, []).await;
    Ok(Json(workspace.visible_to(ctx.user_id)))
}

/// Delete the workspace with its channels, messages and activity
#[utoipa::path(
    delete,
    path = "/api/v1/workspaces/{id}",
    tag = "workspaces",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 204, description = "Workspace deleted"),
        (status = 403, description = "Owner role required", body = ErrorResponse),
        (status = 404, description = "Workspace not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let deleted = state
        .store
        .workspaces
        .delete_workspace(access.workspace_id)
        .await?
        .ok_or_else(|| AppError::not_found("Workspace not found"))?;

    state
        .invalidate(
            deleted.id,
            ctx.user_id,
            deleted.members.iter().map(|m| m.user_id),
        )
        .await;
    state.connections.close_workspace(deleted.id).await;

    tracing::info!(workspace_id = %deleted.id, "Workspace deleted");
    Ok(StatusCode::NO_CONTENT)
}
