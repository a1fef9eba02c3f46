//! Connection registry and room membership
//!
//! A [`ConnectionManager`] is created at startup and shared through application state.
//! Each live WebSocket connection owns a bounded outbound queue; events are delivered by
//! room, never to every connection.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::events::ServerEvent;

pub type ConnectionId = Uuid;

/// Addressable group of connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    User(Uuid),
    Workspace(Uuid),
    Channel { workspace_id: Uuid, channel_id: Uuid },
}

impl Room {
    pub fn channel(workspace_id: Uuid, channel_id: Uuid) -> Self {
        Room::Channel {
            workspace_id,
            channel_id,
        }
    }

    fn workspace_id(&self) -> Option<Uuid> {
        match self {
            Room::User(_) => None,
            Room::Workspace(id) => Some(*id),
            Room::Channel { workspace_id, .. } => Some(*workspace_id),
        }
    }
}

impl Display for Room {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Room::User(id) => write!(f, "user:{}", id),
            Room::Workspace(id) => write!(f, "workspace:{}", id),
            Room::Channel {
                workspace_id,
                channel_id,
            } => write!(f, "workspace:{}:channel:{}", workspace_id, channel_id),
        }
    }
}

/// Handle returned by [`ConnectionManager::register`]
pub struct Registration {
    pub connection_id: ConnectionId,
    pub receiver: mpsc::Receiver<Arc<ServerEvent>>,
}

struct Connection {
    user_id: Uuid,
    sender: mpsc::Sender<Arc<ServerEvent>>,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
    closed: bool,
}

impl Registry {
    fn join(&mut self, connection_id: ConnectionId, room: Room) -> bool {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        connection.rooms.insert(room);
        self.rooms.entry(room).or_default().insert(connection_id);
        true
    }

    fn leave(&mut self, connection_id: ConnectionId, room: &Room) -> bool {
        let removed = self
            .connections
            .get_mut(&connection_id)
            .map(|c| c.rooms.remove(room))
            .unwrap_or(false);
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
        removed
    }

    fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&connection_id)?;
        for room in &connection.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(connection)
    }

    fn user_connections(&self, user_id: Uuid) -> Vec<ConnectionId> {
        self.rooms
            .get(&Room::User(user_id))
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn deliver(&self, connection_id: ConnectionId, event: &Arc<ServerEvent>) -> bool {
        let Some(connection) = self.connections.get(&connection_id) else {
            return false;
        };
        match connection.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    user_id = %connection.user_id,
                    event = event.name(),
                    "Outbound queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %connection_id, "Outbound queue closed");
                false
            }
        }
    }
}

/// Registry of live connections and the rooms they joined
#[derive(Clone)]
pub struct ConnectionManager {
    registry: Arc<RwLock<Registry>>,
    buffer: usize,
}

impl ConnectionManager {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            buffer: buffer.max(1),
        }
    }

    /// Register an authenticated connection. It joins its own `user:{id}` room immediately.
    ///
    /// Returns `None` once the manager has been shut down.
    pub async fn register(&self, user_id: Uuid) -> Option<Registration> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let connection_id = Uuid::new_v4();

        let mut registry = self.registry.write().await;
        if registry.closed {
            return None;
        }
        registry.connections.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                rooms: HashSet::new(),
            },
        );
        registry.join(connection_id, Room::User(user_id));
        tracing::debug!(connection_id = %connection_id, user_id = %user_id, "Connection registered");

        Some(Registration {
            connection_id,
            receiver,
        })
    }

    pub async fn join(&self, connection_id: ConnectionId, room: Room) -> bool {
        self.registry.write().await.join(connection_id, room)
    }

    pub async fn leave(&self, connection_id: ConnectionId, room: &Room) -> bool {
        self.registry.write().await.leave(connection_id, room)
    }

    /// Drop the connection and its outbound queue
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        if let Some(connection) = self.registry.write().await.remove_connection(connection_id) {
            tracing::debug!(
                connection_id = %connection_id,
                user_id = %connection.user_id,
                rooms = connection.rooms.len(),
                "Connection disconnected"
            );
        }
    }

    /// Deliver `event` to one connection
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let event = Arc::new(event);
        self.registry.read().await.deliver(connection_id, &event)
    }

    /// Deliver `event` to every connection in `room`; returns the number of queues reached
    pub async fn emit(&self, room: Room, event: ServerEvent) -> usize {
        self.emit_to_rooms(&[room], event).await
    }

    pub async fn emit_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        self.emit(Room::User(user_id), event).await
    }

    /// Deliver `event` once per connection across the union of `rooms`
    pub async fn emit_to_rooms(&self, rooms: &[Room], event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let registry = self.registry.read().await;

        let mut targets = HashSet::new();
        for room in rooms {
            if let Some(members) = registry.rooms.get(room) {
                targets.extend(members.iter().copied());
            }
        }

        let delivered = targets
            .into_iter()
            .filter(|id| registry.deliver(*id, &event))
            .count();
        tracing::debug!(event = event.name(), rooms = rooms.len(), delivered, "Event emitted");
        delivered
    }

    /// Remove the user's connections from the workspace room and all its channel rooms
    pub async fn evict_from_workspace(&self, workspace_id: Uuid, user_id: Uuid) {
        let mut registry = self.registry.write().await;
        for connection_id in registry.user_connections(user_id) {
            let rooms: Vec<Room> = registry
                .connections
                .get(&connection_id)
                .map(|c| {
                    c.rooms
                        .iter()
                        .filter(|r| r.workspace_id() == Some(workspace_id))
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            for room in rooms {
                registry.leave(connection_id, &room);
            }
        }
    }

    /// Remove the user's connections from one channel room
    pub async fn evict_from_channel(&self, workspace_id: Uuid, channel_id: Uuid, user_id: Uuid) {
        let room = Room::channel(workspace_id, channel_id);
        let mut registry = self.registry.write().await;
        for connection_id in registry.user_connections(user_id) {
            registry.leave(connection_id, &room);
        }
    }

    /// Empty a room entirely (channel or workspace deleted)
    pub async fn close_room(&self, room: &Room) {
        let mut registry = self.registry.write().await;
        let members: Vec<ConnectionId> = registry
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        for connection_id in members {
            registry.leave(connection_id, room);
        }
    }

    /// Empty the workspace room and every channel room under it
    pub async fn close_workspace(&self, workspace_id: Uuid) {
        let mut registry = self.registry.write().await;
        let rooms: Vec<Room> = registry
            .rooms
            .keys()
            .filter(|r| r.workspace_id() == Some(workspace_id))
            .copied()
            .collect();
        for room in rooms {
            let members: Vec<ConnectionId> = registry
                .rooms
                .get(&room)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default();
            for connection_id in members {
                registry.leave(connection_id, &room);
            }
        }
    }

    pub async fn room_size(&self, room: &Room) -> usize {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    pub async fn rooms_of(&self, connection_id: ConnectionId) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .registry
            .read()
            .await
            .connections
            .get(&connection_id)
            .map(|c| c.rooms.iter().copied().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Close every outbound queue and refuse new registrations
    pub async fn shutdown(&self) {
        let mut registry = self.registry.write().await;
        registry.closed = true;
        let count = registry.connections.len();
        registry.connections.clear();
        registry.rooms.clear();
        tracing::info!(connections = count, "Connection manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> ServerEvent {
        ServerEvent::error("ping")
    }

    #[test]
    fn test_room_names() {
        let ws = Uuid::nil();
        let ch = Uuid::from_u128(1);
        assert_eq!(Room::User(ws).to_string(), format!("user:{}", ws));
        assert_eq!(Room::Workspace(ws).to_string(), format!("workspace:{}", ws));
        assert_eq!(
            Room::channel(ws, ch).to_string(),
            format!("workspace:{}:channel:{}", ws, ch)
        );
    }

    #[tokio::test]
    async fn test_register_joins_user_room() {
        let manager = ConnectionManager::new(8);
        let user = Uuid::new_v4();
        let mut reg = manager.register(user).await.unwrap();

        assert_eq!(manager.room_size(&Room::User(user)).await, 1);
        assert_eq!(manager.emit_to_user(user, ping()).await, 1);
        assert_eq!(reg.receiver.recv().await.unwrap().name(), "error");
    }

    #[tokio::test]
    async fn test_emit_only_reaches_room_members() {
        let manager = ConnectionManager::new(8);
        let ws = Uuid::new_v4();
        let mut inside = manager.register(Uuid::new_v4()).await.unwrap();
        let mut outside = manager.register(Uuid::new_v4()).await.unwrap();
        manager.join(inside.connection_id, Room::Workspace(ws)).await;

        assert_eq!(manager.emit(Room::Workspace(ws), ping()).await, 1);
        assert!(inside.receiver.try_recv().is_ok());
        assert!(outside.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_union_delivery_is_deduplicated() {
        let manager = ConnectionManager::new(8);
        let user = Uuid::new_v4();
        let room = Room::channel(Uuid::new_v4(), Uuid::new_v4());
        let mut reg = manager.register(user).await.unwrap();
        manager.join(reg.connection_id, room).await;

        let delivered = manager.emit_to_rooms(&[room, Room::User(user)], ping()).await;
        assert_eq!(delivered, 1);
        assert!(reg.receiver.try_recv().is_ok());
        assert!(reg.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops_event() {
        let manager = ConnectionManager::new(1);
        let user = Uuid::new_v4();
        let mut reg = manager.register(user).await.unwrap();

        assert_eq!(manager.emit_to_user(user, ping()).await, 1);
        assert_eq!(manager.emit_to_user(user, ping()).await, 0);
        assert!(reg.receiver.try_recv().is_ok());
        assert!(reg.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_evict_from_workspace_keeps_other_rooms() {
        let manager = ConnectionManager::new(8);
        let user = Uuid::new_v4();
        let ws = Uuid::new_v4();
        let other_ws = Uuid::new_v4();
        let reg = manager.register(user).await.unwrap();
        manager.join(reg.connection_id, Room::Workspace(ws)).await;
        manager
            .join(reg.connection_id, Room::channel(ws, Uuid::new_v4()))
            .await;
        manager.join(reg.connection_id, Room::Workspace(other_ws)).await;

        manager.evict_from_workspace(ws, user).await;

        let mut expected = vec![Room::User(user), Room::Workspace(other_ws)];
        expected.sort();
        assert_eq!(manager.rooms_of(reg.connection_id).await, expected);
    }

    #[tokio::test]
    async fn test_shutdown_closes_queues() {
        let manager = ConnectionManager::new(8);
        let mut reg = manager.register(Uuid::new_v4()).await.unwrap();

        manager.shutdown().await;

        assert!(reg.receiver.recv().await.is_none());
        assert!(manager.register(Uuid::new_v4()).await.is_none());
        assert_eq!(manager.connection_count().await, 0);
    }
}
