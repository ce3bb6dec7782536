mod common;

use async_trait::async_trait;
use common::{TargetDb, backend, is_safe_identifier, table_role};
use dbcreds::service::TtlDefaults;
use dbcreds::service::identifier::USERNAME_LENGTH;
use dbcreds::storage::{InmemStorage, LEASE_RECORD_PREFIX, Storage, StorageEntry, write_json};
use dbcreds::types::{ConnectionConfig, ConnectionConfigRequest, LeaseMetadata, LeasePolicy, RoleEntry};
use dbcreds::{CredsError, DatabaseBackend, LeaseManager, SecretsBackend};
use chrono::{TimeDelta, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Delays writes of lease records, widening the gap between creating a
/// principal and recording its lease.
struct SlowLeaseWrites {
    inner: InmemStorage,
    delay: Duration,
}

#[async_trait]
impl Storage for SlowLeaseWrites {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, CredsError> {
        self.inner.get(key).await
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), CredsError> {
        if entry.key.starts_with(LEASE_RECORD_PREFIX) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.put(entry).await
    }

    async fn delete(&self, key: &str) -> Result<(), CredsError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CredsError> {
        self.inner.list(prefix).await
    }
}

#[tokio::test]
async fn issue_then_revoke_removes_principal() {
    let target = TargetDb::new("lifecycle");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();

    let cred = backend.issue("web", "token").await.unwrap();
    assert!(is_safe_identifier(&cred.username), "{}", cred.username);
    assert!(cred.username.len() <= USERNAME_LENGTH);
    assert!(cred.username.starts_with("token_"));
    assert!(is_safe_identifier(&cred.password));
    assert_eq!(cred.role_name, "web");
    assert_eq!(cred.ttl, Duration::ZERO);
    assert!(target.table_exists(&cred.username).await);

    let pool = target.inspector().await;
    let (secret,): (String,) = sqlx::query_as(&format!("SELECT secret FROM \"{}\"", cred.username))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(secret, cred.password);
    pool.close().await;

    let outcome = backend.revoke(&cred.lease_metadata()).await.unwrap();
    assert!(outcome.warnings.is_empty());
    assert!(!target.table_exists(&cred.username).await);

    // A second revocation may fail, but loudly and without side effects
    let err = backend.revoke(&cred.lease_metadata()).await.unwrap_err();
    assert!(matches!(err, CredsError::RevocationFailed(_)), "{err}");
}

#[tokio::test]
async fn failed_creation_leaves_nothing_behind() {
    let target = TargetDb::new("atomic");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend
        .roles()
        .put(RoleEntry::new(
            "broken",
            r#"CREATE TABLE "{{name}}" (secret TEXT); INSERT INTO no_such_table VALUES ('{{password}}');"#,
        ))
        .await
        .unwrap();

    let err = backend.issue("broken", "token").await.unwrap_err();
    assert!(matches!(err, CredsError::CreationFailed(_)), "{err}");
    assert!(err.to_string().contains("no_such_table"));
    assert_eq!(target.table_count().await, 0);
}

#[tokio::test]
async fn revoke_with_deleted_role_uses_default_sql() {
    let target = TargetDb::new("deleted-role");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();

    let cred = backend.issue("web", "app").await.unwrap();
    backend.roles().delete("web").await.unwrap();

    let outcome = backend.revoke(&cred.lease_metadata()).await.unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("web"));
    assert!(!target.table_exists(&cred.username).await);
}

#[tokio::test]
async fn revoke_requires_username() {
    let (_storage, backend) = backend();
    let err = backend
        .revoke(&LeaseMetadata {
            username: None,
            role_name: Some("web".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CredsError::MissingUsername));
}

#[tokio::test]
async fn issue_errors_before_touching_the_database() {
    let (_storage, backend) = backend();
    assert!(matches!(
        backend.issue("web", "token").await,
        Err(CredsError::UnknownRole(name)) if name == "web"
    ));

    backend.roles().put(table_role("web")).await.unwrap();
    assert!(matches!(
        backend.issue("web", "token").await,
        Err(CredsError::NotConfigured)
    ));
}

#[tokio::test]
async fn unverifiable_connection_is_not_stored() {
    let (_storage, backend) = backend();
    let request = ConnectionConfigRequest {
        config: ConnectionConfig {
            connection_url: "sqlite:/nonexistent-dir-for-dbcreds/x.sqlite?mode=ro".to_string(),
            ..Default::default()
        },
        verify_connection: true,
    };
    let err = backend.configure(request).await.unwrap_err();
    assert!(matches!(err, CredsError::ConnectionError(_)), "{err}");
    assert!(matches!(
        backend.connection_settings().await,
        Err(CredsError::NotConfigured)
    ));
}

#[tokio::test]
async fn concurrent_issues_get_distinct_usernames() {
    let target = TargetDb::new("concurrent");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let backend = backend.clone();
        tasks.spawn(async move { backend.issue("web", "token").await });
    }

    let mut names = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let cred = joined.unwrap().unwrap();
        assert!(names.insert(cred.username.clone()));
    }
    assert_eq!(names.len(), 16);
    assert_eq!(target.table_count().await, 16);
}

#[tokio::test]
async fn lease_manager_renews_within_max_and_sweeps_expired() {
    let target = TargetDb::new("leases");
    let (storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();
    backend
        .lease_policy()
        .put(LeasePolicy {
            lease: Duration::from_secs(3600),
            lease_max: Duration::from_secs(2 * 3600),
        })
        .await
        .unwrap();

    let leases = Arc::new(LeaseManager::new(storage, backend.clone()));
    let (cred, lease) = leases.issue("web", "token").await.unwrap();
    assert_eq!(lease.ttl, Duration::from_secs(3600));
    assert_eq!(lease.metadata.username.as_deref(), Some(cred.username.as_str()));
    assert_eq!(lease.metadata.role_name.as_deref(), Some("web"));

    let renewed = leases
        .renew(&lease.lease_id, Duration::from_secs(5 * 3600))
        .await
        .unwrap();
    assert!(renewed.ttl <= Duration::from_secs(2 * 3600));
    assert!(renewed.expire_time <= lease.issue_time + TimeDelta::hours(2));

    // Nothing has expired yet
    assert_eq!(leases.sweep(Utc::now()).await.unwrap(), 0);
    assert!(target.table_exists(&cred.username).await);

    assert_eq!(
        leases.sweep(Utc::now() + TimeDelta::hours(3)).await.unwrap(),
        1
    );
    assert!(!target.table_exists(&cred.username).await);
    assert!(leases.list().await.unwrap().is_empty());

    assert!(matches!(
        leases.revoke(&lease.lease_id).await,
        Err(CredsError::LeaseNotFound(_))
    ));
}

#[tokio::test]
async fn clean_resets_the_connection() {
    let target = TargetDb::new("clean");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();

    backend.issue("web", "token").await.unwrap();
    assert!(backend.connections().is_connected().await);

    backend.clean().await;
    assert!(!backend.connections().is_connected().await);

    // Reconnects transparently from stored settings
    backend.issue("web", "token").await.unwrap();
    assert_eq!(target.table_count().await, 2);
}

#[tokio::test]
async fn dropped_issue_still_records_the_lease() {
    let target = TargetDb::new("cancelled");
    let storage: Arc<dyn Storage> = Arc::new(SlowLeaseWrites {
        inner: InmemStorage::new(),
        delay: Duration::from_millis(500),
    });
    let backend = Arc::new(DatabaseBackend::new(storage.clone(), TtlDefaults::default()));
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();
    let leases = LeaseManager::new(storage.clone(), backend);

    let dropped = tokio::time::timeout(Duration::from_millis(100), leases.issue("web", "token")).await;
    assert!(dropped.is_err());

    let mut recorded = Vec::new();
    for _ in 0..40 {
        recorded = leases.list().await.unwrap();
        if !recorded.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(recorded.len(), 1);
    assert_eq!(target.table_count().await, 1);

    let username = recorded[0].metadata.username.clone().unwrap();
    assert!(target.table_exists(&username).await);
    leases.revoke(&recorded[0].lease_id).await.unwrap();
    assert!(!target.table_exists(&username).await);
}

#[tokio::test]
async fn expired_lease_is_not_renewable() {
    let target = TargetDb::new("expired");
    let (storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    backend.roles().put(table_role("web")).await.unwrap();

    let leases = LeaseManager::new(storage.clone(), backend);
    let (_cred, mut lease) = leases.issue("web", "token").await.unwrap();

    // Past its expiry but well inside the system maximum
    lease.expire_time = Utc::now() - TimeDelta::seconds(1);
    write_json(
        storage.as_ref(),
        &format!("{LEASE_RECORD_PREFIX}{}", lease.lease_id),
        &lease,
    )
    .await
    .unwrap();

    let err = leases
        .renew(&lease.lease_id, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, CredsError::LeaseNotRenewable(_)), "{err}");

    assert_eq!(leases.sweep(Utc::now()).await.unwrap(), 1);
    assert_eq!(target.table_count().await, 0);
}

#[tokio::test]
async fn creation_error_does_not_echo_the_password() {
    let target = TargetDb::new("scrub");
    let (_storage, backend) = backend();
    backend.configure(target.connection_request()).await.unwrap();
    // SQLite reports the offending token, which here is the password
    backend
        .roles()
        .put(RoleEntry::new("echo", "SELECT 1 AS x {{password}};"))
        .await
        .unwrap();

    let err = backend.issue("echo", "token").await.unwrap_err();
    let CredsError::CreationFailed(message) = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(message.contains("<redacted>"), "{message}");
}
