//! In-memory store
//!
//! All state lives behind one `tokio::sync::Mutex`, so every operation (including the
//! multi-step ones) is atomic with respect to the others, the same guarantee the
//! PostgreSQL backend gets from transactions and row locks.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tandem_core::constants::GENERAL_CHANNEL;
use tandem_core::models::{
    normalize_channel_name, ActivityEvent, Channel, ChannelUpdate, MemberProfile, Message,
    NewActivity, NewChannel, NewMessage, NewNotification, NewWorkspace, Notification, Reaction,
    ReactionToggle, User, UserProfile, Workspace, WorkspaceMember, WorkspaceRole,
    WorkspaceSummary, WorkspaceUpdate,
};
use tandem_core::AppError;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    ActivityStore, ChannelStore, MessageStore, NotificationStore, UserStore, WorkspaceStore,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// Workspace rows with members; `channels` is always empty here and assembled on read
    workspaces: Vec<Workspace>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    activity: Vec<ActivityEvent>,
}

impl MemoryState {
    fn workspace_mut(&mut self, id: Uuid) -> Option<&mut Workspace> {
        self.workspaces.iter_mut().find(|w| w.id == id)
    }

    fn assemble(&self, id: Uuid) -> Option<Workspace> {
        let mut workspace = self.workspaces.iter().find(|w| w.id == id)?.clone();
        workspace.channels = self
            .channels
            .iter()
            .filter(|c| c.workspace_id == id)
            .cloned()
            .collect();
        Some(workspace)
    }

    fn summary(&self, workspace: &Workspace, viewer: Option<Uuid>) -> WorkspaceSummary {
        WorkspaceSummary {
            id: workspace.id,
            name: workspace.name.clone(),
            description: workspace.description.clone(),
            tags: workspace.tags.clone(),
            repository_full_name: workspace.repository.full_name.clone(),
            repository_url: workspace.repository.url.clone(),
            member_count: workspace.members.len() as i64,
            role: viewer.and_then(|v| workspace.role_of(v)),
            created_at: workspace.created_at,
        }
    }

    fn channel_mut(&mut self, id: Uuid) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    fn channel_name_taken(&self, workspace_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.channels
            .iter()
            .any(|c| c.workspace_id == workspace_id && c.name == name && Some(c.id) != except)
    }
}

/// In-memory implementation of every store trait
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn last_owner_conflict() -> AppError {
    AppError::conflict("A workspace must keep at least one owner")
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, profile: UserProfile) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let taken = state.users.values().any(|u| {
            u.id != profile.id && u.username.eq_ignore_ascii_case(&profile.username)
        });
        if taken {
            return Err(AppError::conflict(format!(
                "Username '{}' is already taken",
                profile.username
            )));
        }

        let now = Utc::now();
        let user = state.users.entry(profile.id).or_insert_with(|| User {
            id: profile.id,
            username: profile.username.clone(),
            display_name: None,
            avatar_url: None,
            owned_workspace_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        user.username = profile.username;
        user.display_name = profile.display_name;
        user.avatar_url = profile.avatar_url;
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .filter(|u| {
                usernames
                    .iter()
                    .any(|name| u.username.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStore {
    async fn create_workspace(&self, new: NewWorkspace) -> Result<Workspace, AppError> {
        let mut state = self.state.lock().await;

        let duplicate = state.workspaces.iter().any(|w| {
            w.repository.provider == new.repository.provider
                && w.repository.external_id == new.repository.external_id
        });
        if duplicate {
            return Err(AppError::conflict(format!(
                "Repository '{}' has already been imported",
                new.repository.full_name
            )));
        }
        if !state.users.contains_key(&new.owner_id) {
            return Err(AppError::not_found("Owner not found"));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        state.workspaces.push(Workspace {
            id,
            owner_id: new.owner_id,
            name: new.name,
            description: new.description,
            tags: new.tags,
            repository: new.repository,
            members: vec![WorkspaceMember {
                user_id: new.owner_id,
                role: WorkspaceRole::Owner,
                joined_at: now,
            }],
            channels: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        state.channels.push(Channel {
            id: Uuid::new_v4(),
            workspace_id: id,
            name: GENERAL_CHANNEL.to_string(),
            is_private: false,
            participants: vec![new.owner_id],
            created_by: new.owner_id,
            created_at: now,
            updated_at: now,
        });
        if let Some(owner) = state.users.get_mut(&new.owner_id) {
            owner.owned_workspace_ids.push(id);
        }

        state
            .assemble(id)
            .ok_or_else(|| AppError::Internal("Workspace vanished after insert".to_string()))
    }

    async fn get_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError> {
        Ok(self.state.lock().await.assemble(id))
    }

    async fn find_by_repository(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Workspace>, AppError> {
        let state = self.state.lock().await;
        let id = state
            .workspaces
            .iter()
            .find(|w| w.repository.provider == provider && w.repository.external_id == external_id)
            .map(|w| w.id);
        Ok(id.and_then(|id| state.assemble(id)))
    }

    async fn list_for_member(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .workspaces
            .iter()
            .rev()
            .filter(|w| w.role_of(user_id).is_some())
            .map(|w| state.summary(w, Some(user_id)))
            .collect())
    }

    async fn list_discoverable(&self, user_id: Uuid) -> Result<Vec<WorkspaceSummary>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .workspaces
            .iter()
            .rev()
            .filter(|w| w.role_of(user_id).is_none())
            .map(|w| state.summary(w, None))
            .collect())
    }

    async fn update_workspace(
        &self,
        id: Uuid,
        update: WorkspaceUpdate,
    ) -> Result<Option<Workspace>, AppError> {
        let mut state = self.state.lock().await;
        let Some(workspace) = state.workspace_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            workspace.name = name;
        }
        if let Some(description) = update.description {
            workspace.description = Some(description);
        }
        if let Some(tags) = update.tags {
            workspace.tags = tags;
        }
        workspace.updated_at = Utc::now();
        Ok(state.assemble(id))
    }

    async fn set_webhook_id(
        &self,
        id: Uuid,
        webhook_id: Option<String>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if let Some(workspace) = state.workspace_mut(id) {
            workspace.repository.webhook_id = webhook_id;
        }
        Ok(())
    }

    async fn delete_workspace(&self, id: Uuid) -> Result<Option<Workspace>, AppError> {
        let mut state = self.state.lock().await;
        let Some(deleted) = state.assemble(id) else {
            return Ok(None);
        };

        state.workspaces.retain(|w| w.id != id);
        state.channels.retain(|c| c.workspace_id != id);
        state.messages.retain(|m| m.workspace_id != id);
        state.activity.retain(|a| a.workspace_id != id);
        for user in state.users.values_mut() {
            user.owned_workspace_ids.retain(|w| *w != id);
        }
        Ok(Some(deleted))
    }

    async fn member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .workspaces
            .iter()
            .find(|w| w.id == workspace_id)
            .and_then(|w| w.role_of(user_id)))
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberProfile>, AppError> {
        let state = self.state.lock().await;
        let Some(workspace) = state.workspaces.iter().find(|w| w.id == workspace_id) else {
            return Ok(Vec::new());
        };
        Ok(workspace
            .members
            .iter()
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|u| MemberProfile {
                    user_id: m.user_id,
                    username: u.username.clone(),
                    display_name: u.display_name.clone(),
                    avatar_url: u.avatar_url.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect())
    }

    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError> {
        let mut state = self.state.lock().await;
        let Some(workspace) = state.workspace_mut(workspace_id) else {
            return Ok(None);
        };
        if workspace.role_of(user_id).is_some() {
            return Err(AppError::conflict("User is already a member of this workspace"));
        }

        let member = WorkspaceMember {
            user_id,
            role,
            joined_at: Utc::now(),
        };
        workspace.members.push(member.clone());

        if let Some(general) = state
            .channels
            .iter_mut()
            .find(|c| c.workspace_id == workspace_id && c.name == GENERAL_CHANNEL)
        {
            if !general.participants.contains(&user_id) {
                general.participants.push(user_id);
            }
        }
        Ok(Some(member))
    }

    async fn set_member_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<WorkspaceMember>, AppError> {
        let mut state = self.state.lock().await;
        let Some(workspace) = state.workspace_mut(workspace_id) else {
            return Ok(None);
        };
        let Some(current) = workspace.role_of(user_id) else {
            return Ok(None);
        };
        if current == WorkspaceRole::Owner
            && role != WorkspaceRole::Owner
            && workspace.owner_count() <= 1
        {
            return Err(last_owner_conflict());
        }

        let Some(member) = workspace.members.iter_mut().find(|m| m.user_id == user_id) else {
            return Ok(None);
        };
        member.role = role;
        let member = member.clone();
        workspace.updated_at = Utc::now();
        Ok(Some(member))
    }

    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let Some(workspace) = state.workspace_mut(workspace_id) else {
            return Ok(false);
        };
        let Some(current) = workspace.role_of(user_id) else {
            return Ok(false);
        };
        if current == WorkspaceRole::Owner && workspace.owner_count() <= 1 {
            return Err(last_owner_conflict());
        }

        workspace.members.retain(|m| m.user_id != user_id);
        workspace.updated_at = Utc::now();
        for channel in state
            .channels
            .iter_mut()
            .filter(|c| c.workspace_id == workspace_id)
        {
            channel.participants.retain(|p| *p != user_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn create_channel(&self, new: NewChannel) -> Result<Channel, AppError> {
        let mut state = self.state.lock().await;
        if !state.workspaces.iter().any(|w| w.id == new.workspace_id) {
            return Err(AppError::not_found("Workspace not found"));
        }
        let name = normalize_channel_name(&new.name);
        if state.channel_name_taken(new.workspace_id, &name, None) {
            return Err(AppError::conflict(format!(
                "Channel '{}' already exists in this workspace",
                name
            )));
        }

        let mut participants = vec![new.created_by];
        for user in new.participants {
            if !participants.contains(&user) {
                participants.push(user);
            }
        }

        let now = Utc::now();
        let channel = Channel {
            id: Uuid::new_v4(),
            workspace_id: new.workspace_id,
            name,
            is_private: new.is_private,
            participants,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        state.channels.push(channel.clone());
        Ok(channel)
    }

    async fn get_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError> {
        let state = self.state.lock().await;
        Ok(state.channels.iter().find(|c| c.id == id).cloned())
    }

    async fn list_visible_channels(
        &self,
        workspace_id: Uuid,
        viewer: Uuid,
    ) -> Result<Vec<Channel>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .channels
            .iter()
            .filter(|c| c.workspace_id == workspace_id && c.can_read(viewer))
            .cloned()
            .collect())
    }

    async fn update_channel(
        &self,
        id: Uuid,
        update: ChannelUpdate,
    ) -> Result<Option<Channel>, AppError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.channels.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };

        let new_name = update.name.as_deref().map(normalize_channel_name);
        if current.is_general() {
            if new_name.as_deref().is_some_and(|n| n != GENERAL_CHANNEL) {
                return Err(AppError::conflict("The general channel cannot be renamed"));
            }
            if update.is_private == Some(true) {
                return Err(AppError::conflict(
                    "The general channel cannot be made private",
                ));
            }
        }
        if let Some(name) = new_name.as_deref() {
            if name == GENERAL_CHANNEL && !current.is_general() {
                return Err(AppError::conflict("Channel 'general' already exists in this workspace"));
            }
            if state.channel_name_taken(current.workspace_id, name, Some(id)) {
                return Err(AppError::conflict(format!(
                    "Channel '{}' already exists in this workspace",
                    name
                )));
            }
        }

        let Some(channel) = state.channel_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = new_name {
            channel.name = name;
        }
        if let Some(is_private) = update.is_private {
            channel.is_private = is_private;
        }
        channel.updated_at = Utc::now();
        Ok(Some(channel.clone()))
    }

    async fn add_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError> {
        let mut state = self.state.lock().await;
        let Some(channel) = state.channel_mut(channel_id) else {
            return Ok(None);
        };
        if !channel.participants.contains(&user_id) {
            channel.participants.push(user_id);
            channel.updated_at = Utc::now();
        }
        Ok(Some(channel.clone()))
    }

    async fn remove_participant(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Channel>, AppError> {
        let mut state = self.state.lock().await;
        let Some(channel) = state.channel_mut(channel_id) else {
            return Ok(None);
        };
        if channel.is_general() {
            return Err(AppError::conflict("The general channel cannot be left"));
        }
        if channel.participants.contains(&user_id) {
            channel.participants.retain(|p| *p != user_id);
            channel.updated_at = Utc::now();
        }
        Ok(Some(channel.clone()))
    }

    async fn delete_channel(&self, id: Uuid) -> Result<Option<Channel>, AppError> {
        let mut state = self.state.lock().await;
        let Some(channel) = state.channels.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        if channel.is_general() {
            return Err(AppError::conflict("The general channel cannot be deleted"));
        }
        state.channels.retain(|c| c.id != id);
        state.messages.retain(|m| m.channel_id != id);
        Ok(Some(channel))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let mut state = self.state.lock().await;
        if !state.channels.iter().any(|c| c.id == new.channel_id) {
            return Err(AppError::not_found("Channel not found"));
        }
        let message = Message {
            id: Uuid::new_v4(),
            channel_id: new.channel_id,
            workspace_id: new.workspace_id,
            sender_id: new.sender_id,
            content: new.content,
            attachments: new.attachments,
            reactions: Vec::new(),
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_messages(
        &self,
        channel_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let state = self.state.lock().await;
        let mut page: Vec<Message> = state
            .messages
            .iter()
            .rev()
            .filter(|m| m.channel_id == channel_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn delete_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let mut state = self.state.lock().await;
        let Some(index) = state
            .messages
            .iter()
            .position(|m| m.id == id && m.sender_id == sender_id)
        else {
            return Ok(None);
        };
        Ok(Some(state.messages.remove(index)))
    }

    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        emoji: &str,
        user_id: Uuid,
    ) -> Result<Option<ReactionToggle>, AppError> {
        let mut state = self.state.lock().await;
        let Some(message) = state.messages.iter_mut().find(|m| m.id == message_id) else {
            return Ok(None);
        };

        let before = message.reactions.len();
        message
            .reactions
            .retain(|r| !(r.emoji == emoji && r.user_id == user_id));
        let added = message.reactions.len() == before;
        if added {
            message.reactions.push(Reaction {
                emoji: emoji.to_string(),
                user_id,
            });
        }
        Ok(Some(ReactionToggle {
            message: message.clone(),
            added,
        }))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError> {
        let mut state = self.state.lock().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            message: new.message,
            notification_type: new.notification_type,
            repo_id: new.repo_id,
            target_type: new.target_type,
            target_id: new.target_id,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record_activity(&self, new: NewActivity) -> Result<ActivityEvent, AppError> {
        let mut state = self.state.lock().await;
        let event = ActivityEvent {
            id: Uuid::new_v4(),
            workspace_id: new.workspace_id,
            actor_id: new.actor_id,
            kind: new.kind,
            detail: new.detail,
            created_at: Utc::now(),
        };
        state.activity.push(event.clone());
        Ok(event)
    }

    async fn list_activity(
        &self,
        workspace_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEvent>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .activity
            .iter()
            .rev()
            .filter(|a| a.workspace_id == workspace_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::models::RepositoryLink;

    async fn user(store: &MemoryStore, username: &str) -> User {
        store
            .upsert_user(UserProfile {
                id: Uuid::new_v4(),
                username: username.to_string(),
                display_name: None,
                avatar_url: None,
            })
            .await
            .unwrap()
    }

    fn repo(external_id: &str) -> RepositoryLink {
        RepositoryLink {
            provider: "github".to_string(),
            external_id: external_id.to_string(),
            full_name: format!("acme/{}", external_id),
            url: format!("https://github.com/acme/{}", external_id),
            default_branch: "main".to_string(),
            webhook_id: None,
        }
    }

    async fn workspace(store: &MemoryStore, owner: &User, external_id: &str) -> Workspace {
        store
            .create_workspace(NewWorkspace {
                owner_id: owner.id,
                name: external_id.to_string(),
                description: None,
                tags: vec![],
                repository: repo(external_id),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_workspace_is_complete() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;

        assert_eq!(ws.role_of(owner.id), Some(WorkspaceRole::Owner));
        assert_eq!(ws.channels.len(), 1);
        let general = ws.general_channel().unwrap();
        assert!(!general.is_private);

        let owner = store.get_user(owner.id).await.unwrap().unwrap();
        assert_eq!(owner.owned_workspace_ids, vec![ws.id]);
    }

    #[tokio::test]
    async fn test_duplicate_repository_conflicts() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        workspace(&store, &owner, "tandem").await;

        let err = store
            .create_workspace(NewWorkspace {
                owner_id: owner.id,
                name: "again".to_string(),
                description: None,
                tags: vec![],
                repository: repo("tandem"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_last_owner_cannot_be_removed_or_demoted() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;

        let err = store.remove_member(ws.id, owner.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = store
            .set_member_role(ws.id, owner.id, WorkspaceRole::Core)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // unchanged
        assert_eq!(
            store.member_role(ws.id, owner.id).await.unwrap(),
            Some(WorkspaceRole::Owner)
        );

        // with a second owner the first one may leave
        let other = user(&store, "other").await;
        store
            .add_member(ws.id, other.id, WorkspaceRole::Owner)
            .await
            .unwrap();
        assert!(store.remove_member(ws.id, owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_private_channels_filtered_in_listing() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let viewer = user(&store, "viewer").await;
        let ws = workspace(&store, &owner, "tandem").await;
        store
            .add_member(ws.id, viewer.id, WorkspaceRole::Viewer)
            .await
            .unwrap();

        let secret = store
            .create_channel(NewChannel {
                workspace_id: ws.id,
                name: "Secret".to_string(),
                is_private: true,
                created_by: owner.id,
                participants: vec![],
            })
            .await
            .unwrap();
        assert_eq!(secret.name, "secret");
        assert_eq!(secret.participants, vec![owner.id]);

        let visible = store.list_visible_channels(ws.id, viewer.id).await.unwrap();
        assert!(visible.iter().all(|c| !c.is_private || c.is_participant(viewer.id)));
        assert_eq!(visible.len(), 1);

        let visible = store.list_visible_channels(ws.id, owner.id).await.unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[tokio::test]
    async fn test_general_channel_is_immutable() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;
        let general = ws.general_channel().unwrap().id;

        let rename = store
            .update_channel(
                general,
                ChannelUpdate {
                    name: Some("random".to_string()),
                    is_private: None,
                },
            )
            .await;
        assert!(matches!(rename, Err(AppError::Conflict(_))));
        let private = store
            .update_channel(
                general,
                ChannelUpdate {
                    name: None,
                    is_private: Some(true),
                },
            )
            .await;
        assert!(matches!(private, Err(AppError::Conflict(_))));
        assert!(matches!(
            store.delete_channel(general).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.remove_participant(general, owner.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_reaction_toggle_twice_restores_state() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;
        let general = ws.general_channel().unwrap().id;
        let message = store
            .create_message(NewMessage {
                channel_id: general,
                workspace_id: ws.id,
                sender_id: owner.id,
                content: "hello".to_string(),
                attachments: vec![],
            })
            .await
            .unwrap();

        let first = store
            .toggle_reaction(message.id, "👍", owner.id)
            .await
            .unwrap()
            .unwrap();
        assert!(first.added);
        assert_eq!(first.message.reactions.len(), 1);

        let second = store
            .toggle_reaction(message.id, "👍", owner.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!second.added);
        assert_eq!(second.message.reactions, message.reactions);

        assert!(store
            .toggle_reaction(Uuid::new_v4(), "👍", owner.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_channel_delete_cascades_messages() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;
        let channel = store
            .create_channel(NewChannel {
                workspace_id: ws.id,
                name: "dev".to_string(),
                is_private: false,
                created_by: owner.id,
                participants: vec![],
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            let m = store
                .create_message(NewMessage {
                    channel_id: channel.id,
                    workspace_id: ws.id,
                    sender_id: owner.id,
                    content: format!("m{}", i),
                    attachments: vec![],
                })
                .await
                .unwrap();
            ids.push(m.id);
        }

        store.delete_channel(channel.id).await.unwrap().unwrap();
        for id in ids {
            assert!(store.get_message(id).await.unwrap().is_none());
        }
        assert!(store.get_channel(channel.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_message_page_is_newest_window_in_chronological_order() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let ws = workspace(&store, &owner, "tandem").await;
        let general = ws.general_channel().unwrap().id;
        for i in 0..5 {
            store
                .create_message(NewMessage {
                    channel_id: general,
                    workspace_id: ws.id,
                    sender_id: owner.id,
                    content: format!("m{}", i),
                    attachments: vec![],
                })
                .await
                .unwrap();
        }

        let page = store.list_messages(general, 2, 0).await.unwrap();
        let contents: Vec<_> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);

        let page = store.list_messages(general, 2, 2).await.unwrap();
        let contents: Vec<_> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_delete_message_only_by_sender() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let other = user(&store, "other").await;
        let ws = workspace(&store, &owner, "tandem").await;
        let general = ws.general_channel().unwrap().id;
        let message = store
            .create_message(NewMessage {
                channel_id: general,
                workspace_id: ws.id,
                sender_id: owner.id,
                content: "mine".to_string(),
                attachments: vec![],
            })
            .await
            .unwrap();

        assert!(store
            .delete_message(message.id, other.id)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .delete_message(message.id, owner.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_remove_member_drops_participations() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner").await;
        let member = user(&store, "member").await;
        let ws = workspace(&store, &owner, "tandem").await;
        store
            .add_member(ws.id, member.id, WorkspaceRole::Contributor)
            .await
            .unwrap();
        let private = store
            .create_channel(NewChannel {
                workspace_id: ws.id,
                name: "core".to_string(),
                is_private: true,
                created_by: owner.id,
                participants: vec![member.id],
            })
            .await
            .unwrap();
        assert!(private.is_participant(member.id));

        assert!(store.remove_member(ws.id, member.id).await.unwrap());
        let private = store.get_channel(private.id).await.unwrap().unwrap();
        assert!(!private.is_participant(member.id));
        assert!(!store.remove_member(ws.id, member.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_notifications_mark_read_only_own() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let n = store
            .create_notification(NewNotification {
                user_id: owner,
                message: "hi".to_string(),
                notification_type: tandem_core::models::NotificationType::Mention,
                repo_id: Uuid::new_v4(),
                target_type: tandem_core::models::NotificationTarget::Message,
                target_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert_eq!(store.unread_count(owner).await.unwrap(), 1);
        assert!(store.mark_read(n.id, stranger).await.unwrap().is_none());
        assert!(store.mark_read(n.id, owner).await.unwrap().unwrap().is_read);
        assert_eq!(store.unread_count(owner).await.unwrap(), 0);
        assert_eq!(store.mark_all_read(owner).await.unwrap(), 0);
    }
}
