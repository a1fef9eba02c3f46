//! Tandem API Library
//!
//! HTTP and WebSocket surface: authentication, per-route permission checks, handlers and
//! application setup.

mod api_doc;
mod handlers;
mod middleware;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::get_openapi_spec;
pub use error::HttpAppError;
pub use state::AppState;
