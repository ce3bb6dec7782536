use super::credential::LeaseMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host-side record of an outstanding credential, stored under
/// `sys/leases/<lease_id>` until the credential is revoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lease {
    pub lease_id: String,
    pub metadata: LeaseMetadata,
    pub issue_time: DateTime<Utc>,
    pub expire_time: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_time <= now
    }
}
