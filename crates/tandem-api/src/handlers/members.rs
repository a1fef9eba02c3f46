//! Workspace membership
//!
//! Core members may invite, re-role and remove, but only an owner may grant the owner role
//! or touch another owner. The last-owner guard itself lives in the store.

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
    ActivityKind, AddMemberRequest, MemberProfile, NewNotification, NotificationTarget,
    NotificationType, UpdateMemberRoleRequest, WorkspaceMember, WorkspaceRole,
};
use tandem_core::AppError;
use uuid::Uuid;

fn require_owner_for(access: &Access, touches_owner: bool) -> Result<(), AppError> {
    if touches_owner && access.role != WorkspaceRole::Owner {
        return Err(AppError::forbidden(
            "Only an owner can grant or change the owner role",
        ));
    }
    Ok(())
}

async fn workspace_name(state: &AppState, workspace_id: Uuid) -> String {
    match state.store.workspaces.get_workspace(workspace_id).await {
        Ok(Some(workspace)) => workspace.name,
        _ => "a workspace".to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{id}/members",
    tag = "members",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 200, description = "Members with profiles", body = [MemberProfile]),
        (status = 403, description = "Not a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, access), fields(workspace_id = %access.workspace_id))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    let members = state
        .store
        .workspaces
        .list_members(access.workspace_id)
        .await?;
    Ok(Json(members))
}

/// Invite an existing user by username
#[utoipa::path(
    post,
    path = "/api/v1/workspaces/{id}/members",
    tag = "members",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = WorkspaceMember),
        (status = 403, description = "Core role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    ValidatedJson(request): ValidatedJson<AddMemberRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_owner_for(&access, request.role == WorkspaceRole::Owner)?;

    let invitee = state
        .store
        .users
        .find_by_username(request.username.trim())
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{}' not found", request.username)))?;

    let member = state
        .store
        .workspaces
        .add_member(access.workspace_id, invitee.id, request.role)
        .await?
        .ok_or_else(|| AppError::not_found("Workspace not found"))?;

    record_activity(
        &state,
        access.workspace_id,
        ctx.user_id,
        ActivityKind::MemberAdded,
        json!({ "user_id": invitee.id, "role": member.role }),
    )
    .await;
    state
        .invalidate(access.workspace_id, ctx.user_id, [invitee.id])
        .await;

    let name = workspace_name(&state, access.workspace_id).await;
    if let Err(e) = state
        .notifications
        .notify(NewNotification {
            user_id: invitee.id,
            message: format!("@{} added you to {} as {}", ctx.username, name, member.role),
            notification_type: NotificationType::Invite,
            repo_id: access.workspace_id,
            target_type: NotificationTarget::Workspace,
            target_id: access.workspace_id,
        })
        .await
    {
        tracing::warn!(error = %e, "Failed to notify invited member");
    }

    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/workspaces/{id}/members/{user_id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Workspace ID"),
        ("user_id" = Uuid, Path, description = "Member user ID")
    ),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = WorkspaceMember),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 409, description = "Would demote the last owner", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access, request), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id, member_id = %member_id))]
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    Path((_workspace_id, member_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<UpdateMemberRoleRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let current = state
        .store
        .workspaces
        .member_role(access.workspace_id, member_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;
    require_owner_for(
        &access,
        current == WorkspaceRole::Owner || request.role == WorkspaceRole::Owner,
    )?;

    let member = state
        .store
        .workspaces
        .set_member_role(access.workspace_id, member_id, request.role)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;

    record_activity(
        &state,
        access.workspace_id,
        ctx.user_id,
        ActivityKind::RoleChanged,
        json!({ "user_id": member_id, "from": current, "to": member.role }),
    )
    .await;
    state
        .invalidate(access.workspace_id, ctx.user_id, [member_id])
        .await;

    if current != member.role && member_id != ctx.user_id {
        let name = workspace_name(&state, access.workspace_id).await;
        if let Err(e) = state
            .notifications
            .notify(NewNotification {
                user_id: member_id,
                message: format!("Your role in {} is now {}", name, member.role),
                notification_type: NotificationType::Role,
                repo_id: access.workspace_id,
                target_type: NotificationTarget::Workspace,
                target_id: access.workspace_id,
            })
            .await
        {
            tracing::warn!(error = %e, "Failed to notify member of role change");
        }
    }

    Ok(Json(member))
}

async fn remove(
    state: &AppState,
    access: &Access,
    actor: Uuid,
    member_id: Uuid,
) -> Result<(), AppError> {
    let removed = state
        .store
        .workspaces
        .remove_member(access.workspace_id, member_id)
        .await?;
    if !removed {
        return Err(AppError::not_found("Member not found"));
    }

    record_activity(
        state,
        access.workspace_id,
        actor,
        ActivityKind::MemberRemoved,
        json!({ "user_id": member_id }),
    )
    .await;
    state
        .invalidate(access.workspace_id, actor, [member_id])
        .await;
    state
        .connections
        .evict_from_workspace(access.workspace_id, member_id)
        .await;
    Ok(())
}

#[utoipa::path(
    delete,
    path = "/api/v1/workspaces/{id}/members/{user_id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Workspace ID"),
        ("user_id" = Uuid, Path, description = "Member user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 409, description = "Would remove the last owner", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id, member_id = %member_id))]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
    Path((_workspace_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let current = state
        .store
        .workspaces
        .member_role(access.workspace_id, member_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member not found"))?;
    require_owner_for(&access, current == WorkspaceRole::Owner)?;

    remove(&state, &access, ctx.user_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Leave a workspace. The last owner has to hand over ownership first.
#[utoipa::path(
    post,
    path = "/api/v1/workspaces/{id}/leave",
    tag = "members",
    params(("id" = Uuid, Path, description = "Workspace ID")),
    responses(
        (status = 204, description = "Left the workspace"),
        (status = 409, description = "Caller is the last owner", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, ctx, access), fields(user_id = %ctx.user_id, workspace_id = %access.workspace_id))]
pub async fn leave_workspace(
    State(state): State<Arc<AppState>>,
    ctx: UserContext,
    access: Access,
) -> Result<impl IntoResponse, HttpAppError> {
    remove(&state, &access, ctx.user_id, ctx.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
