//! Bearer-token authentication
//!
//! Tokens are HS256 JWTs issued by the identity provider. A verified token is mirrored into
//! the user store on every request, so profile changes propagate without a separate sync.

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtService;
pub use middleware::{auth_middleware, authenticate, ws_auth_middleware};
pub use models::{Claims, UserContext};
