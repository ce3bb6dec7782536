//! Dynamic credential lifecycle: issue, renew, revoke.

pub mod backend;
pub mod identifier;
pub mod issuer;
pub mod lease_policy;
pub mod leases;
pub mod renewal;
pub mod revoker;
pub mod roles;
pub mod template;

pub use backend::{DatabaseBackend, SecretsBackend};
pub use leases::LeaseManager;
pub use renewal::TtlDefaults;
pub use revoker::RevocationOutcome;
