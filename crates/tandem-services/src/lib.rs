//! Tandem Services Library
//!
//! Real-time collaboration services layered over the store:
//! - Connection registry and room routing ([`rooms`], [`broadcast`])
//! - WebSocket session state machine ([`realtime`])
//! - Notification persistence and delivery ([`notification`], [`mentions`])
//! - External repository host integration ([`repo_host`], [`repository_events`])

pub mod broadcast;
pub mod events;
pub mod mentions;
pub mod notification;
pub mod realtime;
pub mod repo_host;
pub mod repository_events;
pub mod rooms;

pub use broadcast::Broadcaster;
pub use events::{ChannelRoomRequest, ClientEvent, ServerEvent};
pub use mentions::{MentionOutcome, MentionService};
pub use notification::NotificationService;
pub use realtime::{Session, SessionState};
pub use repo_host::{
    create_repository_host, parse_full_name, GitHubRepositoryHost, NoopRepositoryHost,
    RepositoryHost,
};
pub use repository_events::{verify_signature, RepositoryEventOutcome, RepositoryEventService};
pub use rooms::{ConnectionId, ConnectionManager, Registration, Room};
