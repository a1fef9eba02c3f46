//! Tandem Core Library
//!
//! Domain models, the permission engine, error types, configuration and the pure
//! algorithms (mention extraction, cache key derivation) shared by every Tandem crate.

pub mod cache_keys;
pub mod config;
pub mod constants;
pub mod error;
pub mod mention;
pub mod models;
pub mod permissions;

// Re-export commonly used types
pub use cache_keys::{CacheKey, CanonicalId};
pub use config::{CacheBackendKind, Config, StoreBackendKind};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use mention::extract_mentions;
pub use permissions::{authorize, effective_level, permissions_for, Authorization, Permission};
