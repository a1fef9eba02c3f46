//! Store traits and their backends
//
// Async traits and the `Store` facade
pub mod store;
//
// PostgreSQL repositories
pub mod postgres;
//
// In-memory backend (tests, local development)
pub mod memory;
//
// Transaction utilities
pub mod transaction;
