use crate::error::CredsError;
use crate::storage::{self, ROLE_PREFIX, Storage};
use crate::types::RoleEntry;
use std::sync::Arc;
use tracing::info;

/// CRUD over role templates stored under `roles/<name>`.
#[derive(Clone)]
pub struct RoleRegistry {
    storage: Arc<dyn Storage>,
}

impl RoleRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn key(name: &str) -> String {
        format!("{ROLE_PREFIX}{name}")
    }

    pub async fn get(&self, name: &str) -> Result<Option<RoleEntry>, CredsError> {
        let role: Option<RoleEntry> =
            storage::read_json(self.storage.as_ref(), &Self::key(name)).await?;
        Ok(role.map(|mut role| {
            role.name = name.to_string();
            role
        }))
    }

    pub async fn put(&self, entry: RoleEntry) -> Result<(), CredsError> {
        let entry = entry.normalized();
        entry.validate()?;
        storage::write_json(self.storage.as_ref(), &Self::key(&entry.name), &entry).await?;
        info!(role = %entry.name, "role written");
        Ok(())
    }

    /// Already-issued credentials are unaffected; their revocation falls back
    /// to the default template.
    pub async fn delete(&self, name: &str) -> Result<(), CredsError> {
        self.storage.delete(&Self::key(name)).await?;
        info!(role = %name, "role deleted");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>, CredsError> {
        self.storage.list(ROLE_PREFIX).await
    }
}
