//! OpenAPI documentation.
//! Served at `/api/openapi.json`; every authenticated path sits under `/api/v1`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use tandem_core::models;
use tandem_core::Permission;

/// Returns the OpenAPI document for the HTTP surface.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Registers the `bearer_auth` scheme referenced by the handler annotations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tandem API",
        version = "0.1.0",
        description = "Real-time collaboration API: repository-backed workspaces, channels, messages, reactions and notifications. Live updates are delivered over the /ws WebSocket."
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        handlers::health::health_check,
        handlers::health::liveness_check,
        // Users
        handlers::users::get_me,
        // Workspaces
        handlers::workspaces::create_workspace,
        handlers::workspaces::list_active_workspaces,
        handlers::workspaces::discover_workspaces,
        handlers::workspaces::get_workspace,
        handlers::workspaces::update_workspace,
        handlers::workspaces::delete_workspace,
        handlers::activity::list_activity,
        // Members
        handlers::members::list_members,
        handlers::members::add_member,
        handlers::members::update_member_role,
        handlers::members::remove_member,
        handlers::members::leave_workspace,
        // Channels
        handlers::channels::list_channels,
        handlers::channels::create_channel,
        handlers::channels::update_channel,
        handlers::channels::delete_channel,
        handlers::channels::join_channel,
        handlers::channels::leave_channel,
        handlers::channels::add_participant,
        handlers::channels::remove_participant,
        // Messages
        handlers::messages::list_messages,
        handlers::messages::send_message,
        handlers::messages::get_message,
        handlers::messages::toggle_reaction,
        handlers::messages::delete_message,
        // Notifications
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        // Webhooks
        handlers::webhooks::receive_repository_event,
    ),
    components(
        schemas(
            // Workspaces
            models::Workspace,
            models::WorkspaceSummary,
            models::WorkspaceMember,
            models::WorkspaceRole,
            models::RepositoryLink,
            models::MemberProfile,
            models::CreateWorkspaceRequest,
            models::UpdateWorkspaceRequest,
            models::AddMemberRequest,
            models::UpdateMemberRoleRequest,
            // Channels
            models::Channel,
            models::CreateChannelRequest,
            models::UpdateChannelRequest,
            models::AddParticipantRequest,
            // Messages
            models::Message,
            models::MessageResponse,
            models::Attachment,
            models::Reaction,
            models::ReactionGroup,
            models::SendMessageRequest,
            models::ToggleReactionRequest,
            // Notifications and activity
            models::Notification,
            models::NotificationType,
            models::NotificationTarget,
            models::UnreadCountResponse,
            models::MarkAllReadResponse,
            models::ActivityEvent,
            models::ActivityKind,
            // Users
            models::User,
            models::UserSummary,
            Permission,
            handlers::health::HealthCheckResponse,
            handlers::webhooks::WebhookAck,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "workspaces", description = "Repository-backed workspaces, discovery and the activity log"),
        (name = "members", description = "Workspace membership and roles"),
        (name = "channels", description = "Channels and channel participants"),
        (name = "messages", description = "Channel messages and reactions"),
        (name = "notifications", description = "Per-user notification inbox"),
        (name = "users", description = "The authenticated caller"),
        (name = "webhooks", description = "Signed repository host callbacks"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
