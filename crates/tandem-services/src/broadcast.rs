//! Event routing
//!
//! Message events go to the channel room. Channel lifecycle events for a public channel go
//! to the workspace room; for a private channel they go to the channel room and to the
//! participants' own user rooms, never to the workspace room.

use tandem_core::models::{Channel, Message, MessageResponse, ReactionToggle};
use uuid::Uuid;

use crate::events::{ChannelMembership, ReactionUpdate, ServerEvent};
use crate::rooms::{ConnectionManager, Room};

#[derive(Clone)]
pub struct Broadcaster {
    connections: ConnectionManager,
}

impl Broadcaster {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Rooms that receive lifecycle events for `channel`. `extra_users` are users who must
    /// also hear about it even though they are not (or no longer) participants.
    pub fn channel_audience(channel: &Channel, extra_users: &[Uuid]) -> Vec<Room> {
        if !channel.is_private {
            return vec![Room::Workspace(channel.workspace_id)];
        }

        let mut rooms = vec![Room::channel(channel.workspace_id, channel.id)];
        for user in channel.participants.iter().chain(extra_users) {
            let room = Room::User(*user);
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
        rooms
    }

    async fn lifecycle(&self, channel: &Channel, extra_users: &[Uuid], event: ServerEvent) {
        let rooms = Self::channel_audience(channel, extra_users);
        self.connections.emit_to_rooms(&rooms, event).await;
    }

    pub async fn channel_created(&self, channel: &Channel) {
        self.lifecycle(channel, &[], ServerEvent::NewChannel(channel.clone()))
            .await;
    }

    pub async fn channel_updated(&self, channel: &Channel) {
        self.lifecycle(channel, &[], ServerEvent::ChannelUpdated(channel.clone()))
            .await;
    }

    /// A public channel turned private: participants get `channel_updated`, every other
    /// listed member gets `channel_deleted` so the channel drops out of their view.
    pub async fn channel_made_private(&self, channel: &Channel, members: &[Uuid]) {
        self.channel_updated(channel).await;

        let outsiders: Vec<Room> = members
            .iter()
            .filter(|user| !channel.is_participant(**user))
            .map(|user| Room::User(*user))
            .collect();
        if !outsiders.is_empty() {
            self.connections
                .emit_to_rooms(&outsiders, ServerEvent::ChannelDeleted(channel.clone()))
                .await;
        }
    }

    pub async fn channel_deleted(&self, channel: &Channel) {
        self.lifecycle(channel, &[], ServerEvent::ChannelDeleted(channel.clone()))
            .await;
        self.connections
            .close_room(&Room::channel(channel.workspace_id, channel.id))
            .await;
    }

    pub async fn user_joined_channel(&self, channel: &Channel, user_id: Uuid) {
        let event = ServerEvent::UserJoinedChannel(ChannelMembership {
            user_id,
            channel: channel.clone(),
        });
        self.lifecycle(channel, &[], event).await;
    }

    /// `channel` is the state after removal; the departing user still gets the event.
    pub async fn user_left_channel(&self, channel: &Channel, user_id: Uuid) {
        let event = ServerEvent::UserLeftChannel(ChannelMembership {
            user_id,
            channel: channel.clone(),
        });
        self.lifecycle(channel, &[user_id], event).await;
        if channel.is_private {
            self.connections
                .evict_from_channel(channel.workspace_id, channel.id, user_id)
                .await;
        }
    }

    pub async fn message_received(&self, message: &Message) {
        let room = Room::channel(message.workspace_id, message.channel_id);
        let event = ServerEvent::MessageReceived(MessageResponse::from(message.clone()));
        self.connections.emit(room, event).await;
    }

    pub async fn message_deleted(&self, message: &Message) {
        let room = Room::channel(message.workspace_id, message.channel_id);
        let event = ServerEvent::MessageDeleted(MessageResponse::from(message.clone()));
        self.connections.emit(room, event).await;
    }

    pub async fn reaction_updated(&self, toggle: &ReactionToggle, emoji: &str, user_id: Uuid) {
        let message = &toggle.message;
        let room = Room::channel(message.workspace_id, message.channel_id);
        let event = ServerEvent::ReactionUpdate(ReactionUpdate {
            emoji: emoji.to_string(),
            user_id,
            added: toggle.added,
            message: MessageResponse::from(message.clone()),
        });
        self.connections.emit(room, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn channel(is_private: bool, participants: Vec<Uuid>) -> Channel {
        Channel {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            name: "design".into(),
            is_private,
            participants,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_public_channel_audience_is_workspace_room() {
        let ch = channel(false, vec![Uuid::new_v4()]);
        assert_eq!(
            Broadcaster::channel_audience(&ch, &[]),
            vec![Room::Workspace(ch.workspace_id)]
        );
    }

    #[test]
    fn test_private_channel_audience_excludes_workspace_room() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ch = channel(true, vec![a]);
        let rooms = Broadcaster::channel_audience(&ch, &[b, a]);

        assert!(!rooms.contains(&Room::Workspace(ch.workspace_id)));
        assert_eq!(
            rooms,
            vec![
                Room::channel(ch.workspace_id, ch.id),
                Room::User(a),
                Room::User(b)
            ]
        );
    }

    #[tokio::test]
    async fn test_private_channel_event_skips_workspace_listeners() {
        let manager = ConnectionManager::new(8);
        let broadcaster = Broadcaster::new(manager.clone());
        let participant = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let ch = channel(true, vec![participant]);

        let mut p = manager.register(participant).await.unwrap();
        let mut o = manager.register(outsider).await.unwrap();
        manager
            .join(o.connection_id, Room::Workspace(ch.workspace_id))
            .await;

        broadcaster.channel_created(&ch).await;

        assert_eq!(p.receiver.try_recv().unwrap().name(), "new_channel");
        assert!(o.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_channel_made_private_hides_it_from_outsiders() {
        let manager = ConnectionManager::new(8);
        let broadcaster = Broadcaster::new(manager.clone());
        let participant = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let ch = channel(true, vec![participant]);

        let mut p = manager.register(participant).await.unwrap();
        let mut o = manager.register(outsider).await.unwrap();
        manager
            .join(o.connection_id, Room::Workspace(ch.workspace_id))
            .await;

        broadcaster
            .channel_made_private(&ch, &[participant, outsider])
            .await;

        assert_eq!(p.receiver.try_recv().unwrap().name(), "channel_updated");
        assert!(p.receiver.try_recv().is_err());
        assert_eq!(o.receiver.try_recv().unwrap().name(), "channel_deleted");
        assert!(o.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_user_left_private_channel_is_told_and_evicted() {
        let manager = ConnectionManager::new(8);
        let broadcaster = Broadcaster::new(manager.clone());
        let leaver = Uuid::new_v4();
        let ch = channel(true, vec![]);
        let room = Room::channel(ch.workspace_id, ch.id);

        let mut reg = manager.register(leaver).await.unwrap();
        manager.join(reg.connection_id, room).await;

        broadcaster.user_left_channel(&ch, leaver).await;

        assert_eq!(reg.receiver.try_recv().unwrap().name(), "user_left_channel");
        assert!(reg.receiver.try_recv().is_err());
        assert_eq!(manager.room_size(&room).await, 0);
    }
}
