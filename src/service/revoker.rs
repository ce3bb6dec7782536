use crate::db::{ConnectionManager, DatabaseHandle, Dialect};
use crate::error::CredsError;
use crate::service::roles::RoleRegistry;
use crate::service::template;
use crate::storage::Storage;
use crate::types::{LeaseMetadata, RoleEntry};
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Non-fatal notes gathered while revoking.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RevocationOutcome {
    pub warnings: Vec<String>,
}

/// Kills a principal's sessions and runs its revocation SQL.
pub struct RevocationEngine {
    storage: Arc<dyn Storage>,
    connections: Arc<ConnectionManager>,
    roles: RoleRegistry,
}

impl RevocationEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        connections: Arc<ConnectionManager>,
        roles: RoleRegistry,
    ) -> Self {
        Self {
            storage,
            connections,
            roles,
        }
    }

    pub async fn revoke(&self, metadata: &LeaseMetadata) -> Result<RevocationOutcome, CredsError> {
        let username = metadata
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(CredsError::MissingUsername)?;
        let role_name = metadata.role_name.as_deref().unwrap_or_default();

        let mut outcome = RevocationOutcome::default();

        let role = if role_name.is_empty() {
            None
        } else {
            self.roles.get(role_name).await?
        };
        if role.is_none() {
            // Role deletion must never block revocation
            warn!(role = %role_name, username = %username, "role not found; using default revocation SQL");
            outcome.warnings.push(format!(
                "Role {role_name:?} cannot be found. Using default SQL for revoking user."
            ));
        }

        let handle = self.connections.acquire(self.storage.as_ref()).await?;
        let dialect = handle.dialect();

        let revocation_sql = role
            .as_ref()
            .and_then(|r| r.revocation_sql.as_deref())
            .unwrap_or_else(|| dialect.default_revocation_sql());
        if should_terminate_sessions(role.as_ref()) {
            let killed = terminate_sessions_for(&handle, username).await?;
            if killed > 0 {
                info!(username = %username, sessions = killed, "terminated active sessions");
            }
        }

        let statements = template::render(revocation_sql, &[("name", username)]);
        execute_revocation(&handle, &statements)
            .await
            .map_err(CredsError::RevocationFailed)?;

        info!(username = %username, role = %role_name, "credential revoked");
        Ok(outcome)
    }
}

/// A missing role always terminates; otherwise the role decides.
fn should_terminate_sessions(role: Option<&RoleEntry>) -> bool {
    role.is_none_or(|r| r.terminate_sessions)
}

/// Forcibly end every live session of `username`. Returns how many were
/// terminated.
async fn terminate_sessions_for(
    handle: &DatabaseHandle,
    username: &str,
) -> Result<usize, CredsError> {
    let dialect = handle.dialect();
    let Some(session_query) = dialect.session_query() else {
        return Ok(0);
    };

    let rows = sqlx::query(session_query)
        .bind(username.to_string())
        .fetch_all(handle.pool())
        .await
        .map_err(CredsError::RevocationFailed)?;

    let mut killed = 0;
    for row in rows {
        let session_id: i64 = row
            .try_get("session_id")
            .map_err(CredsError::RevocationFailed)?;
        let Some(kill) = dialect.kill_session(session_id) else {
            continue;
        };
        debug!(username = %username, session_id, "killing session");
        sqlx::query(&kill)
            .persistent(false)
            .execute(handle.pool())
            .await
            .map_err(CredsError::RevocationFailed)?;
        killed += 1;
    }
    Ok(killed)
}

/// Run rendered revocation statements. On engines where DDL participates in
/// transactions they share one; elsewhere each statement commits on its own.
pub(crate) async fn execute_revocation(
    handle: &DatabaseHandle,
    statements: &[Zeroizing<String>],
) -> Result<(), sqlx::Error> {
    if handle.dialect().transactional_ddl() {
        let mut tx = handle.pool().begin().await?;
        for stmt in statements {
            sqlx::query(stmt.as_str())
                .persistent(false)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    } else {
        for stmt in statements {
            sqlx::query(stmt.as_str())
                .persistent(false)
                .execute(handle.pool())
                .await?;
        }
        Ok(())
    }
}

/// Default revocation statements for `username` on `dialect`.
pub(crate) fn default_revocation(dialect: Dialect, username: &str) -> Vec<Zeroizing<String>> {
    template::render(dialect.default_revocation_sql(), &[("name", username)])
}
