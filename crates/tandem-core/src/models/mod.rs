//! Data models for the collaboration domain
//!
//! Each sub-module covers one feature area. Request DTOs carry `validator` rules, response
//! types derive `ToSchema` for the OpenAPI document.

mod activity;
mod channel;
mod message;
mod notification;
mod user;
mod workspace;

// Re-export all models for convenient imports
pub use activity::*;
pub use channel::*;
pub use message::*;
pub use notification::*;
pub use user::*;
pub use workspace::*;
