use crate::error::CredsError;
use crate::storage::{self, LEASE_CONFIG_KEY, Storage};
use crate::types::LeasePolicy;
use std::sync::Arc;

/// Reads and writes the `config/lease` record.
#[derive(Clone)]
pub struct LeasePolicyStore {
    storage: Arc<dyn Storage>,
}

impl LeasePolicyStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self) -> Result<Option<LeasePolicy>, CredsError> {
        storage::read_json(self.storage.as_ref(), LEASE_CONFIG_KEY).await
    }

    /// The stored policy, or zero values when none has been written.
    pub async fn get_or_default(&self) -> Result<LeasePolicy, CredsError> {
        Ok(self.get().await?.unwrap_or_default())
    }

    pub async fn put(&self, policy: LeasePolicy) -> Result<(), CredsError> {
        policy.validate()?;
        storage::write_json(self.storage.as_ref(), LEASE_CONFIG_KEY, &policy).await
    }
}
