//! Key-value persistence for configuration, roles and host lease records.
//!
//! Layout:
//! - `memory.rs`: in-process map, used by tests and ephemeral setups
//! - `sqlite.rs`: durable store over a single `kv` table
//! - `schema.rs`: SQL DDL for initializing the SQLite store

pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::error::CredsError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

pub use memory::InmemStorage;
pub use sqlite::SqliteStorage;

pub const CONNECTION_CONFIG_KEY: &str = "config/connection";
pub const LEASE_CONFIG_KEY: &str = "config/lease";
pub const ROLE_PREFIX: &str = "roles/";
pub const LEASE_RECORD_PREFIX: &str = "sys/leases/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, CredsError> {
        Ok(Self {
            key: key.into(),
            value: serde_json::to_vec(value)?,
        })
    }

    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, CredsError> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

/// Opaque key-value store the backend persists its state into.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, CredsError>;

    async fn put(&self, entry: StorageEntry) -> Result<(), CredsError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CredsError>;

    /// Keys under `prefix`, with the prefix stripped, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, CredsError>;
}

pub async fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, CredsError> {
    storage
        .get(key)
        .await?
        .map(|entry| entry.decode_json())
        .transpose()
}

pub async fn write_json<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), CredsError> {
    storage.put(StorageEntry::json(key, value)?).await
}
