use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::constants::GENERAL_CHANNEL;

/// Channel inside a workspace. Participants only matter for private channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Channel {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub is_private: bool,
    pub participants: Vec<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn is_general(&self) -> bool {
        self.name == GENERAL_CHANNEL
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// Read access for a workspace member: always for public channels, participants only
    /// for private ones.
    pub fn can_read(&self, user_id: Uuid) -> bool {
        !self.is_private || self.is_participant(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub workspace_id: Uuid,
    pub name: String,
    pub is_private: bool,
    pub created_by: Uuid,
    /// Extra participants besides the creator
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub is_private: Option<bool>,
}

/// Request DTO for creating a channel
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateChannelRequest {
    #[validate(length(
        min = 1,
        max = 80,
        message = "Channel name must be between 1 and 80 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    /// Initial participants of a private channel (must be workspace members)
    #[serde(default)]
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateChannelRequest {
    #[validate(length(
        min = 1,
        max = 80,
        message = "Channel name must be between 1 and 80 characters"
    ))]
    pub name: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

/// Channel names are stored trimmed and lowercased
pub fn normalize_channel_name(name: &str) -> String {
    name.trim().to_lowercase()
}
