//! Tandem persistence layer
//!
//! Store traits for users, workspaces, channels, messages, notifications and the activity
//! log, with a PostgreSQL implementation (sqlx) and an in-memory one sharing the same
//! semantics. Callers hold the cloneable [`Store`] facade.

pub mod db;

pub use db::memory::MemoryStore;
pub use db::postgres::{
    ActivityRepository, ChannelRepository, MessageRepository, NotificationRepository,
    UserRepository, WorkspaceRepository,
};
pub use db::store::{
    ActivityStore, ChannelStore, MessageStore, NotificationStore, Store, UserStore,
    WorkspaceStore,
};
