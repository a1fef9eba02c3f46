//! Route-level permission checks
//!
//! Each protected route declares which resource its `{id}` path parameter names and which
//! permission it needs. The guard resolves the resource to its workspace, looks up the
//! caller's role there, runs [`authorize`] and hands the resolved [`Access`] to the handler.
//! Nothing is mutated before the guard has passed.

use crate::auth::UserContext;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use std::collections::HashMap;
use std::sync::Arc;
use tandem_core::models::{Channel, Message, WorkspaceRole};
use tandem_core::{authorize, AppError, Permission};
use uuid::Uuid;

/// What the `{id}` path parameter refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Workspace,
    /// `require_participation`: private channels additionally require the caller to be a
    /// participant
    Channel { require_participation: bool },
    /// Resolved through the message's channel
    Message { require_participation: bool },
}

#[derive(Clone)]
pub struct PermissionGuard {
    state: Arc<AppState>,
    scope: Scope,
    required: Permission,
}

/// Resolved target of a guarded request
#[derive(Debug, Clone)]
pub struct Access {
    pub workspace_id: Uuid,
    pub role: WorkspaceRole,
    pub channel: Option<Channel>,
    pub message: Option<Message>,
}

impl Access {
    pub fn channel(&self) -> Result<&Channel, AppError> {
        self.channel
            .as_ref()
            .ok_or_else(|| AppError::Internal("Route is not channel-scoped".to_string()))
    }

    pub fn message(&self) -> Result<&Message, AppError> {
        self.message
            .as_ref()
            .ok_or_else(|| AppError::Internal("Route is not message-scoped".to_string()))
    }
}

impl<S> FromRequestParts<S> for Access
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Access>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Internal("Route is not guarded".to_string())))
    }
}

/// Wrap `route` so every method on it passes the permission check first.
pub fn guarded(
    state: &Arc<AppState>,
    scope: Scope,
    required: Permission,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    let guard = PermissionGuard {
        state: state.clone(),
        scope,
        required,
    };
    route.route_layer(from_fn_with_state(guard, permission_middleware))
}

fn path_id(params: &HashMap<String, String>) -> Result<Uuid, AppError> {
    let raw = params
        .get("id")
        .ok_or_else(|| AppError::Internal("Guarded route has no {id} parameter".to_string()))?;
    Ok(Uuid::parse_str(raw)?)
}

async fn resolve(guard: &PermissionGuard, id: Uuid, user_id: Uuid) -> Result<Access, AppError> {
    let store = &guard.state.store;

    let (workspace_id, channel, message, require_participation) = match guard.scope {
        Scope::Workspace => (id, None, None, false),
        Scope::Channel {
            require_participation,
        } => {
            let channel = store
                .channels
                .get_channel(id)
                .await?
                .ok_or_else(|| AppError::not_found("Channel not found"))?;
            (channel.workspace_id, Some(channel), None, require_participation)
        }
        Scope::Message {
            require_participation,
        } => {
            let message = store
                .messages
                .get_message(id)
                .await?
                .ok_or_else(|| AppError::not_found("Message not found"))?;
            let channel = store
                .channels
                .get_channel(message.channel_id)
                .await?
                .ok_or_else(|| AppError::not_found("Channel not found"))?;
            (
                channel.workspace_id,
                Some(channel),
                Some(message),
                require_participation,
            )
        }
    };

    let role = store.workspaces.member_role(workspace_id, user_id).await?;
    let Some(member_role) = role else {
        if guard.scope == Scope::Workspace
            && store.workspaces.get_workspace(workspace_id).await?.is_none()
        {
            return Err(AppError::not_found("Workspace not found"));
        }
        return Err(AppError::forbidden("Not a member of this workspace"));
    };

    if !authorize(role, guard.required).is_allowed() {
        return Err(AppError::forbidden(format!(
            "Role '{}' lacks '{}'",
            member_role, guard.required
        )));
    }

    if require_participation {
        if let Some(channel) = &channel {
            if !channel.can_read(user_id) {
                return Err(AppError::forbidden(
                    "Private channel is limited to its participants",
                ));
            }
        }
    }

    Ok(Access {
        workspace_id,
        role: member_role,
        channel,
        message,
    })
}

pub async fn permission_middleware(
    State(guard): State<PermissionGuard>,
    Path(params): Path<HashMap<String, String>>,
    ctx: UserContext,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let id = path_id(&params)?;
    let access = resolve(&guard, id, ctx.user_id).await?;

    tracing::debug!(
        user_id = %ctx.user_id,
        workspace_id = %access.workspace_id,
        role = %access.role,
        required = %guard.required,
        "Permission granted"
    );
    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}
