use crate::error::CredsError;
use serde::Serialize;

const POSTGRES_DEFAULT_REVOCATION: &str = r#"
REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA public FROM "{{name}}";
REVOKE ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public FROM "{{name}}";
REVOKE USAGE ON SCHEMA public FROM "{{name}}";
DROP ROLE "{{name}}";
"#;

const MYSQL_DEFAULT_REVOCATION: &str = r#"
REVOKE ALL PRIVILEGES, GRANT OPTION FROM '{{name}}'@'%';
DROP USER '{{name}}'@'%';
"#;

const SQLITE_DEFAULT_REVOCATION: &str = r#"
DROP TABLE IF EXISTS "{{name}}";
"#;

/// Database engine behind a connection URL.
///
/// SQLite has no principals or sessions; it is supported for embedded and
/// local setups where roles model each credential as a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, CredsError> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(CredsError::InvalidRequest(format!(
                "unsupported connection URL scheme {scheme:?}; expected postgres, mysql or sqlite"
            ))),
        }
    }

    /// Longest principal name the engine accepts.
    pub fn max_username_len(self) -> usize {
        match self {
            Dialect::Postgres => 63,
            Dialect::MySql => 32,
            Dialect::Sqlite => 64,
        }
    }

    /// Whether `CREATE`/`DROP` statements can be rolled back. MySQL commits
    /// DDL implicitly, so its revocation statements run one by one.
    pub fn transactional_ddl(self) -> bool {
        match self {
            Dialect::Postgres | Dialect::Sqlite => true,
            Dialect::MySql => false,
        }
    }

    pub fn default_revocation_sql(self) -> &'static str {
        match self {
            Dialect::Postgres => POSTGRES_DEFAULT_REVOCATION,
            Dialect::MySql => MYSQL_DEFAULT_REVOCATION,
            Dialect::Sqlite => SQLITE_DEFAULT_REVOCATION,
        }
    }

    /// Query listing live session ids for the principal bound as the only
    /// parameter. Returns a single BIGINT column `session_id`.
    pub fn session_query(self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => Some(
                "SELECT CAST(pid AS BIGINT) AS session_id FROM pg_stat_activity \
                 WHERE usename = $1 AND pid <> pg_backend_pid()",
            ),
            Dialect::MySql => Some(
                "SELECT CAST(ID AS SIGNED) AS session_id FROM information_schema.PROCESSLIST \
                 WHERE USER = ?",
            ),
            Dialect::Sqlite => None,
        }
    }

    pub fn kill_session(self, session_id: i64) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!("SELECT pg_terminate_backend({session_id})")),
            Dialect::MySql => Some(format!("KILL {session_id}")),
            Dialect::Sqlite => None,
        }
    }
}
