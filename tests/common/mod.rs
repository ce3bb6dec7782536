#![allow(dead_code)]

use dbcreds::storage::{InmemStorage, Storage};
use dbcreds::types::{ConnectionConfig, ConnectionConfigRequest, RoleEntry};
use dbcreds::{DatabaseBackend, service::TtlDefaults};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TABLE_ROLE_SQL: &str = r#"
CREATE TABLE "{{name}}" (secret TEXT NOT NULL);
INSERT INTO "{{name}}" (secret) VALUES ('{{password}}');
"#;

pub const TABLE_REVOCATION_SQL: &str = r#"DROP TABLE "{{name}}";"#;

/// A throwaway SQLite file acting as the target database.
pub struct TargetDb {
    pub path: PathBuf,
}

impl TargetDb {
    pub fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "dbcreds-target-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path.display())
    }

    pub fn connection_request(&self) -> ConnectionConfigRequest {
        ConnectionConfigRequest {
            config: ConnectionConfig {
                connection_url: self.url(),
                max_open_connections: 1,
                ..Default::default()
            },
            verify_connection: true,
        }
    }

    /// Independent pool for asserting on the target's contents.
    pub async fn inspector(&self) -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&self.url())
            .await
            .expect("failed to open inspector pool")
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        let pool = self.inspector().await;
        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(&pool)
                .await
                .expect("sqlite_master query failed");
        pool.close().await;
        count == 1
    }

    pub async fn table_count(&self) -> i64 {
        let pool = self.inspector().await;
        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .expect("sqlite_master query failed");
        pool.close().await;
        count
    }
}

impl Drop for TargetDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn backend() -> (Arc<dyn Storage>, Arc<DatabaseBackend>) {
    let storage: Arc<dyn Storage> = Arc::new(InmemStorage::new());
    let backend = Arc::new(DatabaseBackend::new(storage.clone(), TtlDefaults::default()));
    (storage, backend)
}

pub fn table_role(name: &str) -> RoleEntry {
    RoleEntry::new(name, TABLE_ROLE_SQL).with_revocation_sql(TABLE_REVOCATION_SQL)
}

pub fn is_safe_identifier(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
