//! WebSocket frame types
//!
//! Every frame is `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use tandem_core::models::{Channel, MessageResponse, Notification};
use uuid::Uuid;

/// Events pushed to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewChannel(Channel),
    ChannelUpdated(Channel),
    ChannelDeleted(Channel),
    UserJoinedChannel(ChannelMembership),
    UserLeftChannel(ChannelMembership),
    MessageReceived(MessageResponse),
    MessageDeleted(MessageResponse),
    ReactionUpdate(ReactionUpdate),
    NewNotification(Notification),
    Joined(RoomAck),
    Left(RoomAck),
    Error(EventError),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewChannel(_) => "new_channel",
            ServerEvent::ChannelUpdated(_) => "channel_updated",
            ServerEvent::ChannelDeleted(_) => "channel_deleted",
            ServerEvent::UserJoinedChannel(_) => "user_joined_channel",
            ServerEvent::UserLeftChannel(_) => "user_left_channel",
            ServerEvent::MessageReceived(_) => "message_received",
            ServerEvent::MessageDeleted(_) => "message_deleted",
            ServerEvent::ReactionUpdate(_) => "reaction_update",
            ServerEvent::NewNotification(_) => "new_notification",
            ServerEvent::Joined(_) => "joined",
            ServerEvent::Left(_) => "left",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(EventError {
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMembership {
    pub user_id: Uuid,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionUpdate {
    pub emoji: String,
    pub user_id: Uuid,
    pub added: bool,
    pub message: MessageResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomAck {
    pub room: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventError {
    pub message: String,
}

/// Requests sent by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinWorkspace(Uuid),
    JoinChannel(ChannelRoomRequest),
    LeaveChannel(ChannelRoomRequest),
    LeaveWorkspace(Uuid),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRoomRequest {
    #[serde(alias = "workspace_id")]
    pub workspace_id: Uuid,
    #[serde(alias = "channel_id")]
    pub channel_id: Uuid,
}
