//! Store traits
//!
//! Every conditional mutation returns `Ok(None)` (or `false`) when its target does not exist,
//! so callers can map absence to `NotFound` without a separate read. Invariant violations
//! (duplicate repository, duplicate channel name, last owner, immutable `general` channel)
//! surface as `AppError::Conflict` before anything is written.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tandem_core::models::{
    ActivityEvent, Channel, ChannelUpdate, MemberProfile, Message, NewActivity, NewChannel,
    NewMessage, NewNotification, NewWorkspace, Notification, ReactionToggle, User, UserProfile,
    Workspace, WorkspaceMember, WorkspaceRole, WorkspaceSummary, WorkspaceUpdate,
};
use tandem_core::AppError;
use uuid::Uuid;

use super::memory::MemoryStore;
use super::postgres::{
    ActivityRepository, ChannelRepository, MessageRepository, NotificationRepository,
    UserRepository, WorkspaceRepository,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or refresh a user from verified token claims
    async fn upsert_user(&self, profile: UserProfile) -> Result<User, AppError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Case-insensitive username lookup
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Case-insensitive batch lookup; unknown names are simply absent from the result
    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError>;
}

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Atomically create the workspace, its owner membership, the `general` channel and the
    /// owner's owned-list entry. Duplicate repository ⇒ `Conflict`.
    async fn create_workspace(&self, new: NewWorkspace) -> Result<Workspace, AppError>;

    async fn get_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError>;

    async fn find_by_repository(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Workspace>, AppError>;

    /// Workspaces the user belongs to
    async fn list_for_member(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError>;

    /// Workspaces the user does not belong to
    async fn list_discoverable(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError>;

    async fn update_workspace(
        &self,
        id: Uuid,
        update: WorkspaceUpdate,
    ) -> Result<Option<Workspace>, AppError>;

    async fn set_webhook_id(&self, id: Uuid, webhook_id: Option<String>)
        -> Result<(), AppError>;

    /// Cascades to channels, participants, messages, reactions and activity. Returns the
    /// deleted document.
    async fn delete_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError>;

    async fn member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError>;

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberProfile>, AppError>;

    /// Add a member (also a participant of `general`). Already a member ⇒ `Conflict`.
    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError>;

    /// Demoting the sole owner ⇒ `Conflict`
    async fn set_member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError>;

    /// Removing the sole owner ⇒ `Conflict`. Also drops the user's channel participations.
    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Creator becomes a participant. Duplicate name in the workspace ⇒ `Conflict`.
    async fn create_channel(&self, new: NewChannel) -> Result<Channel, AppError>;

    async fn get_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError>;

    /// Public channels plus private channels the viewer participates in
    async fn list_visible_channels(
        &self,
        workspace_id: Uuid,
        viewer: Uuid,
    ) -> Result<Vec<Channel>, AppError>;

    /// `general` cannot be renamed or made private
    async fn update_channel(
        &self,
        id: Uuid,
        update: ChannelUpdate,
    ) -> Result<Option<Channel>, AppError>;

    /// Idempotent
    async fn add_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError>;

    /// Idempotent; `general` cannot be left
    async fn remove_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError>;

    /// Cascades to messages and reactions; `general` cannot be deleted
    async fn delete_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError>;

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, AppError>;

    /// Newest `limit` messages after skipping `offset`, returned oldest first
    async fn list_messages(
        &self,
        channel_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Deletes only when `sender_id` authored the message
    async fn delete_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> Result<Option<Message>, AppError>;

    /// Remove `(emoji, user)` if present, insert it otherwise
    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        emoji: &str,
        user_id: Uuid,
    ) -> Result<Option<ReactionToggle>, AppError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError>;

    /// Newest first
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError>;

    /// Only the addressee can mark a notification read
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record_activity(&self, new: NewActivity) -> Result<ActivityEvent, AppError>;

    /// Newest first
    async fn list_activity(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEvent>, AppError>;
}

/// Cloneable handle over one backend
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserStore>,
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub messages: Arc<dyn MessageStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub activity: Arc<dyn ActivityStore>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        tracing::info!("Initializing PostgreSQL store");
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            workspaces: Arc::new(WorkspaceRepository::new(pool.clone())),
            channels: Arc::new(ChannelRepository::new(pool.clone())),
            messages: Arc::new(MessageRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            activity: Arc::new(ActivityRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        tracing::info!("Initializing in-memory store");
        let memory = Arc::new(MemoryStore::new());
        Self {
            users: memory.clone(),
            workspaces: memory.clone(),
            channels: memory.clone(),
            messages: memory.clone(),
            notifications: memory.clone(),
            activity: memory,
        }
    }
}
