pub mod permission;

pub use permission::{guarded, Access, Scope};
