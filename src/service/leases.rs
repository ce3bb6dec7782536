use crate::error::CredsError;
use crate::service::backend::{DatabaseBackend, SecretsBackend};
use crate::service::revoker::RevocationOutcome;
use crate::storage::{self, LEASE_RECORD_PREFIX, Storage};
use crate::types::{IssuedCredential, Lease};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tracks outstanding leases and revokes them when they expire.
#[derive(Clone)]
pub struct LeaseManager {
    storage: Arc<dyn Storage>,
    backend: Arc<DatabaseBackend>,
}

impl LeaseManager {
    pub fn new(storage: Arc<dyn Storage>, backend: Arc<DatabaseBackend>) -> Self {
        Self { storage, backend }
    }

    fn key(lease_id: &str) -> String {
        format!("{LEASE_RECORD_PREFIX}{lease_id}")
    }

    async fn load(&self, lease_id: &str) -> Result<Lease, CredsError> {
        storage::read_json(self.storage.as_ref(), &Self::key(lease_id))
            .await?
            .ok_or_else(|| CredsError::LeaseNotFound(lease_id.to_string()))
    }

    async fn save(&self, lease: &Lease) -> Result<(), CredsError> {
        storage::write_json(self.storage.as_ref(), &Self::key(&lease.lease_id), lease).await
    }

    /// Issue a credential and start tracking its lease.
    ///
    /// Creation and lease recording run on their own task, so dropping this
    /// future cannot leave a committed principal without a lease record.
    pub async fn issue(
        &self,
        role_name: &str,
        display_name: &str,
    ) -> Result<(IssuedCredential, Lease), CredsError> {
        let this = self.clone();
        let role_name = role_name.to_string();
        let display_name = display_name.to_string();
        tokio::spawn(async move { this.issue_tracked(&role_name, &display_name).await }).await?
    }

    async fn issue_tracked(
        &self,
        role_name: &str,
        display_name: &str,
    ) -> Result<(IssuedCredential, Lease), CredsError> {
        let cred = self.backend.issue(role_name, display_name).await?;
        let policy = self.backend.lease_policy().get_or_default().await?;
        let ttl = self.backend.ttl_defaults().initial_ttl(cred.ttl, &policy);

        let lease = Lease {
            lease_id: format!("creds/{role_name}/{}", Uuid::new_v4().simple()),
            metadata: cred.lease_metadata(),
            issue_time: cred.issue_time,
            expire_time: expiry(cred.issue_time, ttl)?,
            ttl,
        };
        if let Err(e) = self.save(&lease).await {
            // An untracked principal would never be revoked
            error!(lease_id = %lease.lease_id, error = %e, "failed to record lease; revoking credential");
            if let Err(revoke_err) = self.backend.revoke(&lease.metadata).await {
                error!(lease_id = %lease.lease_id, error = %revoke_err, "revocation of untracked credential failed");
            }
            return Err(e);
        }
        Ok((cred, lease))
    }

    pub async fn renew(&self, lease_id: &str, increment: Duration) -> Result<Lease, CredsError> {
        let mut lease = self.load(lease_id).await?;
        // Taken before the backend's own clock read, so the expiry stays
        // within the backend's bound.
        let now = Utc::now();
        if lease.is_expired(now) {
            return Err(CredsError::LeaseNotRenewable(format!(
                "lease {lease_id} expired at {}",
                lease.expire_time
            )));
        }
        let ttl = self.backend.renew(&lease, increment).await?;
        lease.ttl = ttl;
        lease.expire_time = expiry(now, ttl)?;
        self.save(&lease).await?;
        info!(lease_id = %lease_id, ttl_secs = ttl.as_secs(), "lease renewed");
        Ok(lease)
    }

    /// Revoke and forget a lease. The record is kept when revocation fails
    /// so the sweeper retries it.
    pub async fn revoke(&self, lease_id: &str) -> Result<RevocationOutcome, CredsError> {
        let lease = self.load(lease_id).await?;
        let outcome = self.backend.revoke(&lease.metadata).await?;
        self.storage.delete(&Self::key(lease_id)).await?;
        info!(lease_id = %lease_id, "lease revoked");
        Ok(outcome)
    }

    pub async fn list(&self) -> Result<Vec<Lease>, CredsError> {
        let mut leases = Vec::new();
        for id in self.storage.list(LEASE_RECORD_PREFIX).await? {
            match self.load(&id).await {
                Ok(lease) => leases.push(lease),
                // Removed concurrently
                Err(CredsError::LeaseNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(leases)
    }

    /// Revoke every lease expired at `now`. Returns how many were revoked.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, CredsError> {
        let mut revoked = 0;
        for lease in self.list().await? {
            if !lease.is_expired(now) {
                continue;
            }
            match self.revoke(&lease.lease_id).await {
                Ok(outcome) => {
                    for warning in outcome.warnings {
                        warn!(lease_id = %lease.lease_id, "{warning}");
                    }
                    revoked += 1;
                }
                Err(e) => {
                    error!(lease_id = %lease.lease_id, error = %e, "expired lease revocation failed; will retry");
                }
            }
        }
        Ok(revoked)
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Lease Sweeper Started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.sweep(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => debug!(revoked = n, "sweep completed"),
                    Err(e) => warn!(error = %e, "lease sweep failed"),
                }
            }
        })
    }
}

fn expiry(from: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, CredsError> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .ok_or_else(|| CredsError::InvalidRequest(format!("ttl out of range: {ttl:?}")))
}
