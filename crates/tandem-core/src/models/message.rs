use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, Validate)]
pub struct Attachment {
    #[validate(length(min = 1, max = 255, message = "Attachment name is required"))]
    pub name: String,
    #[validate(url(message = "Invalid attachment URL"))]
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
}

/// One `(emoji, user)` pair; a message holds a set of these
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reaction {
    pub emoji: String,
    pub user_id: Uuid,
}

/// Reactions grouped by emoji at read time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub workspace_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: Uuid,
    pub workspace_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Result of a reaction toggle
#[derive(Debug, Clone)]
pub struct ReactionToggle {
    pub message: Message,
    /// true when the pair was inserted, false when it was removed
    pub added: bool,
}

/// Group reaction pairs by emoji, ordered by emoji
pub fn group_reactions(reactions: &[Reaction]) -> Vec<ReactionGroup> {
    let mut groups: BTreeMap<&str, Vec<Uuid>> = BTreeMap::new();
    for reaction in reactions {
        let users = groups.entry(reaction.emoji.as_str()).or_default();
        if !users.contains(&reaction.user_id) {
            users.push(reaction.user_id);
        }
    }
    groups
        .into_iter()
        .map(|(emoji, user_ids)| ReactionGroup {
            emoji: emoji.to_string(),
            count: user_ids.len(),
            user_ids,
        })
        .collect()
}

/// Message as returned over HTTP and in realtime events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub workspace_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<ReactionGroup>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        MessageResponse {
            reactions: group_reactions(&message.reactions),
            id: message.id,
            channel_id: message.channel_id,
            workspace_id: message.workspace_id,
            sender_id: message.sender_id,
            content: message.content,
            attachments: message.attachments,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    #[validate(length(
        min = 1,
        max = 4000,
        message = "Message content must be between 1 and 4000 characters"
    ))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 attachments are allowed"), nested)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ToggleReactionRequest {
    #[validate(length(min = 1, max = 32, message = "Emoji must be between 1 and 32 characters"))]
    pub emoji: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
