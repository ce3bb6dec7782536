//! Target database access: engine dialects and the shared connection handle.
//!
//! Layout:
//! - `dialect.rs`: per-engine SQL (session views, kill commands, default revocation)
//! - `connection.rs`: lazily opened, health-checked pool behind a single lock

pub mod connection;
pub mod dialect;

pub use connection::{ConnectionManager, DatabaseHandle};
pub use dialect::Dialect;
