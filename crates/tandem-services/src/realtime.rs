//! Per-connection session state machine
//!
//! `Connecting → Authenticated → Joined(rooms) → Disconnected`. Token verification happens
//! before the WebSocket upgrade; a [`Session`] only ever sees authenticated users. Every
//! join request is checked against the store at the time it arrives.

use std::collections::BTreeSet;
use std::sync::Arc;
use tandem_core::{authorize, AppError, Permission};
use tandem_db::Store;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{ChannelRoomRequest, ClientEvent, RoomAck, ServerEvent};
use crate::rooms::{ConnectionId, ConnectionManager, Room};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated {
        user_id: Uuid,
        connection_id: ConnectionId,
    },
    Joined {
        user_id: Uuid,
        connection_id: ConnectionId,
        rooms: BTreeSet<Room>,
    },
    Disconnected,
}

pub struct Session {
    state: SessionState,
    store: Store,
    connections: ConnectionManager,
}

impl Session {
    pub fn new(store: Store, connections: ConnectionManager) -> Self {
        Self {
            state: SessionState::Connecting,
            store,
            connections,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Register the verified user; returns the outbound event queue.
    pub async fn authenticate(
        &mut self,
        user_id: Uuid,
    ) -> Result<mpsc::Receiver<Arc<ServerEvent>>, AppError> {
        if self.state != SessionState::Connecting {
            return Err(AppError::conflict("Session is already authenticated"));
        }
        let registration = self
            .connections
            .register(user_id)
            .await
            .ok_or_else(|| AppError::Internal("Server is shutting down".to_string()))?;

        self.state = SessionState::Authenticated {
            user_id,
            connection_id: registration.connection_id,
        };
        tracing::info!(user_id = %user_id, connection_id = %registration.connection_id, "Realtime session authenticated");
        Ok(registration.receiver)
    }

    fn identity(&self) -> Option<(Uuid, ConnectionId)> {
        match &self.state {
            SessionState::Authenticated {
                user_id,
                connection_id,
            }
            | SessionState::Joined {
                user_id,
                connection_id,
                ..
            } => Some((*user_id, *connection_id)),
            _ => None,
        }
    }

    /// Refresh the joined-room set from the registry, which also reflects server-side
    /// evictions (member removed, channel deleted).
    async fn sync_rooms(&mut self) {
        let Some((user_id, connection_id)) = self.identity() else {
            return;
        };
        let rooms: BTreeSet<Room> = self
            .connections
            .rooms_of(connection_id)
            .await
            .into_iter()
            .filter(|room| !matches!(room, Room::User(_)))
            .collect();

        self.state = if rooms.is_empty() {
            SessionState::Authenticated {
                user_id,
                connection_id,
            }
        } else {
            SessionState::Joined {
                user_id,
                connection_id,
                rooms,
            }
        };
    }

    /// Parse and handle one text frame. The reply (ack or error) is queued on this
    /// connection's outbound queue.
    pub async fn handle_text(&mut self, text: &str) {
        let reply = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                tracing::debug!(error = %e, "Unrecognized client frame");
                ServerEvent::error("Unrecognized event")
            }
        };
        if let Some((_, connection_id)) = self.identity() {
            self.connections.send_to(connection_id, reply).await;
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) -> ServerEvent {
        let result = match event {
            ClientEvent::JoinWorkspace(workspace_id) => self.join_workspace(workspace_id).await,
            ClientEvent::JoinChannel(request) => self.join_channel(request).await,
            ClientEvent::LeaveChannel(request) => {
                self.leave(Room::channel(request.workspace_id, request.channel_id))
                    .await
            }
            ClientEvent::LeaveWorkspace(workspace_id) => {
                self.leave(Room::Workspace(workspace_id)).await
            }
        };
        result.unwrap_or_else(|e| ServerEvent::error(e.to_string()))
    }

    async fn join_workspace(&mut self, workspace_id: Uuid) -> Result<ServerEvent, AppError> {
        let (user_id, connection_id) = self
            .identity()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let role = self
            .store
            .workspaces
            .member_role(workspace_id, user_id)
            .await?;
        if !authorize(role, Permission::Read).is_allowed() {
            return Err(AppError::forbidden("Not a member of this workspace"));
        }

        let room = Room::Workspace(workspace_id);
        self.connections.join(connection_id, room).await;
        self.sync_rooms().await;

        Ok(ServerEvent::Joined(RoomAck {
            room: room.to_string(),
        }))
    }

    async fn join_channel(&mut self, request: ChannelRoomRequest) -> Result<ServerEvent, AppError> {
        let (user_id, connection_id) = self
            .identity()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let channel = self
            .store
            .channels
            .get_channel(request.channel_id)
            .await?
            .filter(|c| c.workspace_id == request.workspace_id)
            .ok_or_else(|| AppError::not_found("Channel not found"))?;

        let role = self
            .store
            .workspaces
            .member_role(channel.workspace_id, user_id)
            .await?;
        if !authorize(role, Permission::Read).is_allowed() || !channel.can_read(user_id) {
            return Err(AppError::forbidden("No access to this channel"));
        }

        let room = Room::channel(channel.workspace_id, channel.id);
        self.connections.join(connection_id, room).await;
        self.sync_rooms().await;

        Ok(ServerEvent::Joined(RoomAck {
            room: room.to_string(),
        }))
    }

    async fn leave(&mut self, room: Room) -> Result<ServerEvent, AppError> {
        let (_, connection_id) = self
            .identity()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        self.connections.leave(connection_id, &room).await;
        self.sync_rooms().await;

        Ok(ServerEvent::Left(RoomAck {
            room: room.to_string(),
        }))
    }

    /// Leave every room and drop the outbound queue
    pub async fn close(&mut self) {
        if let Some((user_id, connection_id)) = self.identity() {
            self.connections.disconnect(connection_id).await;
            tracing::info!(user_id = %user_id, connection_id = %connection_id, "Realtime session closed");
        }
        self.state = SessionState::Disconnected;
    }
}
