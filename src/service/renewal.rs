//! Lease extension arithmetic. Never touches the database.

use crate::error::CredsError;
use crate::types::LeasePolicy;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host-wide TTLs used when the lease policy leaves a value at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlDefaults {
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl Default for TtlDefaults {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_ttl: Duration::from_secs(768 * 60 * 60),
        }
    }
}

impl TtlDefaults {
    pub fn effective_max(&self, policy: &LeasePolicy) -> Duration {
        if policy.lease_max.is_zero() {
            self.max_ttl
        } else {
            policy.lease_max
        }
    }

    /// TTL for a fresh lease: the policy's `lease`, else the host default,
    /// never beyond the effective maximum.
    pub fn initial_ttl(&self, policy_ttl: Duration, policy: &LeasePolicy) -> Duration {
        let ttl = if policy_ttl.is_zero() {
            self.default_ttl
        } else {
            policy_ttl
        };
        ttl.min(self.effective_max(policy))
    }
}

fn to_delta(d: Duration) -> Result<TimeDelta, CredsError> {
    TimeDelta::from_std(d)
        .map_err(|_| CredsError::InvalidRequest(format!("duration out of range: {d:?}")))
}

/// Compute the TTL (measured from `now`) for a renewal request.
///
/// The increment is `requested`, else the policy's `lease`, else the host
/// default; the resulting expiry is clamped to `issue_time + lease_max`.
pub fn extend(
    policy: &LeasePolicy,
    defaults: &TtlDefaults,
    issue_time: DateTime<Utc>,
    requested: Duration,
    now: DateTime<Utc>,
) -> Result<Duration, CredsError> {
    let max = defaults.effective_max(policy);
    let max_expiry = issue_time + to_delta(max)?;
    if now >= max_expiry {
        return Err(CredsError::LeaseNotRenewable(format!(
            "lease reached its maximum TTL of {}s",
            max.as_secs()
        )));
    }

    let increment = if !requested.is_zero() {
        requested
    } else if !policy.lease.is_zero() {
        policy.lease
    } else {
        defaults.default_ttl
    };

    let remaining = (max_expiry - now)
        .to_std()
        .map_err(|_| CredsError::LeaseNotRenewable("lease already expired".to_string()))?;
    Ok(increment.min(remaining))
}
