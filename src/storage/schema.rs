//! SQL DDL for initializing the key-value store.

/// SQLite schema with:
/// - `key` TEXT PRIMARY KEY (paths such as `roles/web`)
/// - `value` BLOB holding the JSON-encoded record
/// - `updated_at` TEXT, RFC3339, for operators inspecting the file
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
