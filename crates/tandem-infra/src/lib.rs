//! Tandem Infrastructure Library
//!
//! Shared infrastructure used by the services and API crates:
//! - Cache-aside layer with Redis, in-memory LRU and disabled backends
//! - Middleware (request ID, security headers)
//! - Telemetry initialization
//! - HTTP error response shape

pub mod cache;

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

// Re-export commonly used types
pub use cache::{create_cache_backend, CacheAside, CacheBackend, CacheError, CacheLookup};

#[cfg(feature = "middleware")]
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use error::ErrorResponse;
