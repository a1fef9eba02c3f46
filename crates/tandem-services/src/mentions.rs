//! Mention fan-out
//!
//! `@name` tokens are resolved against known usernames. A resolved user is notified at most
//! once per message, and only when they can read the channel. Everything else (unknown
//! names, non-members, non-participants of a private channel) is recorded as an
//! informational `mention` activity entry instead.

use std::collections::HashSet;
use tandem_core::models::{
    ActivityKind, Channel, Message, NewActivity, NewNotification, NotificationTarget,
    NotificationType,
};
use tandem_core::{extract_mentions, AppError};
use tandem_db::Store;
use uuid::Uuid;

use crate::notification::NotificationService;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MentionOutcome {
    /// Users who received a mention notification, in mention order
    pub notified: Vec<Uuid>,
    /// Tokens that did not resolve to a reader of the channel
    pub unresolved: Vec<String>,
}

#[derive(Clone)]
pub struct MentionService {
    store: Store,
    notifications: NotificationService,
}

impl MentionService {
    pub fn new(store: Store, notifications: NotificationService) -> Self {
        Self {
            store,
            notifications,
        }
    }

    #[tracing::instrument(skip_all, fields(message_id = %message.id, channel_id = %channel.id))]
    pub async fn fan_out(
        &self,
        channel: &Channel,
        message: &Message,
        sender_username: &str,
    ) -> Result<MentionOutcome, AppError> {
        let tokens = extract_mentions(&message.content);
        if tokens.is_empty() {
            return Ok(MentionOutcome::default());
        }

        let users = self.store.users.find_by_usernames(&tokens).await?;
        let mut outcome = MentionOutcome::default();
        let mut seen = HashSet::new();
        let mut batch = Vec::new();

        for token in tokens {
            let Some(user) = users
                .iter()
                .find(|u| u.username.eq_ignore_ascii_case(&token))
            else {
                outcome.unresolved.push(token);
                continue;
            };
            if user.id == message.sender_id || !seen.insert(user.id) {
                continue;
            }

            let role = self
                .store
                .workspaces
                .member_role(message.workspace_id, user.id)
                .await?;
            if role.is_none() || !channel.can_read(user.id) {
                outcome.unresolved.push(token);
                continue;
            }

            outcome.notified.push(user.id);
            batch.push(NewNotification {
                user_id: user.id,
                message: format!("@{} mentioned you in #{}", sender_username, channel.name),
                notification_type: NotificationType::Mention,
                repo_id: message.workspace_id,
                target_type: NotificationTarget::Message,
                target_id: message.id,
            });
        }

        self.notifications.notify_all(batch).await;

        if !outcome.unresolved.is_empty() {
            let activity = NewActivity {
                workspace_id: message.workspace_id,
                actor_id: Some(message.sender_id),
                kind: ActivityKind::Mention,
                detail: serde_json::json!({
                    "message_id": message.id,
                    "channel_id": channel.id,
                    "unresolved": outcome.unresolved,
                }),
            };
            if let Err(e) = self.store.activity.record_activity(activity).await {
                tracing::warn!(error = %e, "Failed to record unresolved mentions");
            }
        }

        tracing::debug!(
            notified = outcome.notified.len(),
            unresolved = outcome.unresolved.len(),
            "Mentions fanned out"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::ConnectionManager;
    use tandem_core::models::{
        NewChannel, NewMessage, NewWorkspace, RepositoryLink, User, UserProfile, Workspace,
        WorkspaceRole,
    };

    struct Fixture {
        store: Store,
        service: MentionService,
        workspace: Workspace,
        owner: User,
    }

    async fn user(store: &Store, username: &str) -> User {
        store
            .users
            .upsert_user(UserProfile {
                id: Uuid::new_v4(),
                username: username.into(),
                display_name: None,
                avatar_url: None,
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Store::in_memory();
        let owner = user(&store, "octo").await;
        let workspace = store
            .workspaces
            .create_workspace(NewWorkspace {
                owner_id: owner.id,
                name: "api".into(),
                description: None,
                tags: vec![],
                repository: RepositoryLink {
                    provider: "github".into(),
                    external_id: "1".into(),
                    full_name: "tandem/api".into(),
                    url: "https://github.com/tandem/api".into(),
                    default_branch: "main".into(),
                    webhook_id: None,
                },
            })
            .await
            .unwrap();
        let notifications = NotificationService::new(
            store.notifications.clone(),
            ConnectionManager::new(8),
        );
        let service = MentionService::new(store.clone(), notifications);
        Fixture {
            store,
            service,
            workspace,
            owner,
        }
    }

    async fn post(f: &Fixture, channel: &Channel, content: &str) -> Message {
        f.store
            .messages
            .create_message(NewMessage {
                channel_id: channel.id,
                workspace_id: f.workspace.id,
                sender_id: f.owner.id,
                content: content.into(),
                attachments: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_each_user_notified_once() {
        let f = fixture().await;
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        for member in [&alice, &bob] {
            f.store
                .workspaces
                .add_member(f.workspace.id, member.id, WorkspaceRole::Contributor)
                .await
                .unwrap();
        }
        let general = f.workspace.general_channel().unwrap().clone();
        let message = post(&f, &general, "@alice @ALICE @bob @Alice look").await;

        let outcome = f.service.fan_out(&general, &message, "octo").await.unwrap();

        assert_eq!(outcome.notified.len(), 2);
        assert!(outcome.notified.contains(&alice.id));
        assert!(outcome.notified.contains(&bob.id));
        assert!(outcome.unresolved.is_empty());
        assert_eq!(f.store.notifications.unread_count(alice.id).await.unwrap(), 1);
        assert_eq!(f.store.notifications.unread_count(bob.id).await.unwrap(), 1);
        assert_eq!(
            f.store.notifications.unread_count(f.owner.id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sender_and_unknown_names_are_not_notified() {
        let f = fixture().await;
        let general = f.workspace.general_channel().unwrap().clone();
        let message = post(&f, &general, "@octo meet @ghost").await;

        let outcome = f.service.fan_out(&general, &message, "octo").await.unwrap();

        assert!(outcome.notified.is_empty());
        assert_eq!(outcome.unresolved, vec!["ghost".to_string()]);
        assert_eq!(f.store.notifications.unread_count(f.owner.id).await.unwrap(), 0);

        let activity = f
            .store
            .activity
            .list_activity(f.workspace.id, 10, 0)
            .await
            .unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].kind, ActivityKind::Mention);
        assert_eq!(activity[0].detail["unresolved"][0], "ghost");
    }

    #[tokio::test]
    async fn test_private_channel_mentions_skip_non_participants() {
        let f = fixture().await;
        let bob = user(&f.store, "bob").await;
        f.store
            .workspaces
            .add_member(f.workspace.id, bob.id, WorkspaceRole::Viewer)
            .await
            .unwrap();
        let secret = f
            .store
            .channels
            .create_channel(NewChannel {
                workspace_id: f.workspace.id,
                name: "secret".into(),
                is_private: true,
                created_by: f.owner.id,
                participants: vec![],
            })
            .await
            .unwrap();
        let message = post(&f, &secret, "@bob the plan").await;

        let outcome = f.service.fan_out(&secret, &message, "octo").await.unwrap();

        assert!(outcome.notified.is_empty());
        assert_eq!(outcome.unresolved, vec!["bob".to_string()]);
        assert_eq!(f.store.notifications.unread_count(bob.id).await.unwrap(), 0);
    }
}
