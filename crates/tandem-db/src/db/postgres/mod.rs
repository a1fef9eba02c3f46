//! PostgreSQL repositories
//!
//! Runtime-checked `sqlx::query_as::<Postgres, T>` queries; every multi-row mutation runs in
//! a single transaction.

mod activity;
mod channels;
mod messages;
mod notifications;
mod users;
mod workspaces;

pub use activity::ActivityRepository;
pub use channels::ChannelRepository;
pub use messages::MessageRepository;
pub use notifications::NotificationRepository;
pub use users::UserRepository;
pub use workspaces::WorkspaceRepository;

use tandem_core::AppError;

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message.into()),
        _ => AppError::Database(err),
    }
}
