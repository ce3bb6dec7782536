use crate::db::{ConnectionManager, Dialect};
use crate::error::CredsError;
use crate::service::identifier::{self, USERNAME_LENGTH};
use crate::service::lease_policy::LeasePolicyStore;
use crate::service::revoker;
use crate::service::roles::RoleRegistry;
use crate::service::template;
use crate::storage::Storage;
use crate::types::IssuedCredential;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Creates a fresh database principal for a role.
pub struct CredentialIssuer {
    storage: Arc<dyn Storage>,
    connections: Arc<ConnectionManager>,
    roles: RoleRegistry,
    lease_policy: LeasePolicyStore,
}

impl CredentialIssuer {
    pub fn new(
        storage: Arc<dyn Storage>,
        connections: Arc<ConnectionManager>,
        roles: RoleRegistry,
        lease_policy: LeasePolicyStore,
    ) -> Self {
        Self {
            storage,
            connections,
            roles,
            lease_policy,
        }
    }

    /// Dropping the returned future before it resolves rolls the open
    /// transaction back.
    pub async fn issue(
        &self,
        role_name: &str,
        display_name: &str,
    ) -> Result<IssuedCredential, CredsError> {
        debug!(role = %role_name, "getting role");
        let role = self
            .roles
            .get(role_name)
            .await?
            .ok_or_else(|| CredsError::UnknownRole(role_name.to_string()))?;

        debug!(role = %role_name, "getting lease policy");
        let policy = self.lease_policy.get_or_default().await?;

        debug!(role = %role_name, "getting database handle");
        let handle = self.connections.acquire(self.storage.as_ref()).await?;
        let dialect = handle.dialect();

        let username =
            identifier::new_username(display_name, USERNAME_LENGTH.min(dialect.max_username_len()));
        let password = Zeroizing::new(identifier::new_password()?);

        // Every placeholder is replaced before anything reaches the database
        let statements = template::render(
            &role.creation_sql,
            &[("name", username.as_str()), ("password", password.as_str())],
        );

        debug!(role = %role_name, username = %username, "starting transaction");
        let mut tx = handle
            .pool()
            .begin()
            .await
            .map_err(CredsError::ConnectionError)?;

        let mut executed = 0;
        for stmt in &statements {
            let result = sqlx::query(stmt.as_str())
                .persistent(false)
                .execute(&mut *tx)
                .await;
            if let Err(e) = result {
                let message = scrub(&e.to_string(), &password);
                debug!(role = %role_name, username = %username, "rolling back transaction");
                if let Err(rb) = tx.rollback().await {
                    warn!(username = %username, error = %rb, "rollback failed");
                }
                if needs_cleanup(dialect, executed) {
                    warn!(
                        username = %username,
                        error = %message,
                        "creation failed after auto-committed statements; dropping principal"
                    );
                    let cleanup = revoker::default_revocation(dialect, &username);
                    if let Err(cleanup_err) = revoker::execute_revocation(&handle, &cleanup).await {
                        warn!(username = %username, error = %cleanup_err, "cleanup of partial principal failed");
                    }
                }
                return Err(CredsError::CreationFailed(message));
            }
            executed += 1;
        }

        debug!(role = %role_name, username = %username, "committing transaction");
        tx.commit()
            .await
            .map_err(|e| CredsError::CreationFailed(scrub(&e.to_string(), &password)))?;

        info!(role = %role_name, username = %username, "credential issued");
        Ok(IssuedCredential {
            username,
            password: password.as_str().to_owned(),
            role_name: role_name.to_string(),
            issue_time: Utc::now(),
            ttl: policy.lease,
        })
    }
}

/// DDL that committed implicitly survives the rollback and has to be undone.
fn needs_cleanup(dialect: Dialect, executed: usize) -> bool {
    executed > 0 && !dialect.transactional_ddl()
}

/// Driver messages may quote the failing statement, password included.
fn scrub(message: &str, password: &str) -> String {
    if password.is_empty() {
        return message.to_string();
    }
    message.replace(password, "<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_only_after_auto_committed_ddl() {
        assert!(needs_cleanup(Dialect::MySql, 1));
        assert!(!needs_cleanup(Dialect::MySql, 0));
        assert!(!needs_cleanup(Dialect::Postgres, 3));
        assert!(!needs_cleanup(Dialect::Sqlite, 1));
    }

    #[test]
    fn scrub_hides_the_password() {
        let message = "syntax error near 'abc123' in IDENTIFIED BY abc123";
        assert_eq!(
            scrub(message, "abc123"),
            "syntax error near '<redacted>' in IDENTIFIED BY <redacted>"
        );
        assert_eq!(scrub(message, ""), message);
    }
}
