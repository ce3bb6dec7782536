use crate::db::{ConnectionManager, DatabaseHandle};
use crate::error::CredsError;
use crate::service::issuer::CredentialIssuer;
use crate::service::lease_policy::LeasePolicyStore;
use crate::service::renewal::{self, TtlDefaults};
use crate::service::revoker::{RevocationEngine, RevocationOutcome};
use crate::service::roles::RoleRegistry;
use crate::storage::{self, CONNECTION_CONFIG_KEY, Storage};
use crate::types::{
    ConnectionConfig, ConnectionConfigRequest, ConnectionSettings, IssuedCredential, Lease,
    LeaseMetadata,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Capabilities a host drives a dynamic-credential backend through.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Store connection settings; the next database access reconnects.
    async fn configure(&self, request: ConnectionConfigRequest) -> Result<(), CredsError>;

    async fn issue(&self, role_name: &str, display_name: &str)
    -> Result<IssuedCredential, CredsError>;

    /// New TTL for `lease`, measured from now.
    async fn renew(&self, lease: &Lease, requested: Duration) -> Result<Duration, CredsError>;

    async fn revoke(&self, metadata: &LeaseMetadata) -> Result<RevocationOutcome, CredsError>;

    /// Release resources; called when the backend is unmounted or shut down.
    async fn clean(&self);
}

/// Dynamic database credentials backed by a role registry and one shared pool.
pub struct DatabaseBackend {
    storage: Arc<dyn Storage>,
    connections: Arc<ConnectionManager>,
    roles: RoleRegistry,
    lease_policy: LeasePolicyStore,
    issuer: CredentialIssuer,
    revoker: RevocationEngine,
    ttl_defaults: TtlDefaults,
}

impl DatabaseBackend {
    pub fn new(storage: Arc<dyn Storage>, ttl_defaults: TtlDefaults) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let roles = RoleRegistry::new(storage.clone());
        let lease_policy = LeasePolicyStore::new(storage.clone());
        let issuer = CredentialIssuer::new(
            storage.clone(),
            connections.clone(),
            roles.clone(),
            lease_policy.clone(),
        );
        let revoker = RevocationEngine::new(storage.clone(), connections.clone(), roles.clone());
        Self {
            storage,
            connections,
            roles,
            lease_policy,
            issuer,
            revoker,
            ttl_defaults,
        }
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn lease_policy(&self) -> &LeasePolicyStore {
        &self.lease_policy
    }

    pub fn ttl_defaults(&self) -> &TtlDefaults {
        &self.ttl_defaults
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub async fn connection_settings(&self) -> Result<ConnectionSettings, CredsError> {
        let config: ConnectionConfig =
            storage::read_json(self.storage.as_ref(), CONNECTION_CONFIG_KEY)
                .await?
                .ok_or(CredsError::NotConfigured)?;
        Ok(config.settings())
    }
}

#[async_trait]
impl SecretsBackend for DatabaseBackend {
    async fn configure(&self, request: ConnectionConfigRequest) -> Result<(), CredsError> {
        let config = request.config;
        config.validate()?;

        if request.verify_connection {
            let handle = DatabaseHandle::open(&config).await?;
            let probed = handle.probe().await;
            handle.close().await;
            probed?;
        }

        storage::write_json(self.storage.as_ref(), CONNECTION_CONFIG_KEY, &config).await?;
        self.connections.reset().await;
        info!(
            dialect = ?config.dialect()?,
            verified = request.verify_connection,
            "connection configured"
        );
        Ok(())
    }

    async fn issue(
        &self,
        role_name: &str,
        display_name: &str,
    ) -> Result<IssuedCredential, CredsError> {
        self.issuer.issue(role_name, display_name).await
    }

    async fn renew(&self, lease: &Lease, requested: Duration) -> Result<Duration, CredsError> {
        let policy = self.lease_policy.get_or_default().await?;
        renewal::extend(
            &policy,
            &self.ttl_defaults,
            lease.issue_time,
            requested,
            Utc::now(),
        )
    }

    async fn revoke(&self, metadata: &LeaseMetadata) -> Result<RevocationOutcome, CredsError> {
        self.revoker.revoke(metadata).await.inspect_err(|e| {
            warn!(
                username = metadata.username.as_deref().unwrap_or("-"),
                error = %e,
                "revocation failed"
            );
        })
    }

    async fn clean(&self) {
        self.connections.reset().await;
    }
}
