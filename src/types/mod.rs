//! Records exchanged with storage and with API callers.
//!
//! Layout:
//! - `config.rs`: connection settings and lease policy (`config/*` keys)
//! - `role.rs`: role templates (`roles/<name>` keys)
//! - `credential.rs`: issued credentials and their lease metadata
//! - `lease.rs`: host-side lease records tracked for renewal and expiry

pub mod config;
pub mod credential;
pub mod lease;
pub mod role;

pub use config::{ConnectionConfig, ConnectionConfigRequest, ConnectionSettings, LeasePolicy};
pub use credential::{IssuedCredential, LeaseMetadata};
pub use lease::Lease;
pub use role::RoleEntry;
