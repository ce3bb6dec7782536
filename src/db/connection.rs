use super::dialect::Dialect;
use crate::error::CredsError;
use crate::storage::{self, CONNECTION_CONFIG_KEY, Storage};
use crate::types::ConnectionConfig;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{AnyPool, Connection};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// A pooled connection to the target database plus the dialect it speaks.
/// Cloning is cheap; clones share the same pool.
#[derive(Clone, Debug)]
pub struct DatabaseHandle {
    pool: AnyPool,
    dialect: Dialect,
}

impl DatabaseHandle {
    /// Open a pool for `config`. Connects eagerly, so an unreachable
    /// database fails here rather than on first use.
    pub async fn open(config: &ConnectionConfig) -> Result<Self, CredsError> {
        config.validate()?;
        let dialect = config.dialect()?;
        install_default_drivers();

        // The request rate is low; a couple of connections is plenty.
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_open_connections)
            .min_connections(config.idle_connections())
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(config.url())
            .await
            .map_err(CredsError::ConnectionError)?;

        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Lightweight liveness check.
    ///
    /// A pool whose connections are all checked out is busy, not dead: the
    /// probe passes without waiting for one to come back.
    pub async fn probe(&self) -> Result<(), CredsError> {
        if self.pool.is_closed() {
            return Err(CredsError::ConnectionError(sqlx::Error::PoolClosed));
        }
        if self.is_saturated() {
            return Ok(());
        }

        let mut conn = match self.pool.try_acquire() {
            Some(conn) => conn,
            None => match self.pool.acquire().await {
                Ok(conn) => conn,
                Err(sqlx::Error::PoolTimedOut) => return Ok(()),
                Err(e) => return Err(CredsError::ConnectionError(e)),
            },
        };
        conn.ping().await.map_err(CredsError::ConnectionError)
    }

    fn is_saturated(&self) -> bool {
        self.pool.num_idle() == 0
            && self.pool.size() >= self.pool.options().get_max_connections()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Owns the single shared [`DatabaseHandle`].
///
/// The lock covers only the check-and-replace sequence in [`acquire`];
/// queries run on the returned handle without holding it, and a replaced
/// handle is closed after the lock is released.
///
/// [`acquire`]: ConnectionManager::acquire
#[derive(Default)]
pub struct ConnectionManager {
    handle: Mutex<Option<DatabaseHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, storage: &dyn Storage) -> Result<DatabaseHandle, CredsError> {
        let mut guard = self.handle.lock().await;

        let mut stale = None;
        if let Some(handle) = guard.clone() {
            match handle.probe().await {
                Ok(()) => return Ok(handle),
                Err(e) => {
                    warn!(error = %e, "database liveness probe failed; reconnecting");
                    stale = guard.take();
                }
            }
        }

        let opened = Self::open_configured(storage).await;
        if let Ok(handle) = &opened {
            *guard = Some(handle.clone());
        }
        drop(guard);

        // Closing waits for checked-out connections, so it happens unlocked
        if let Some(handle) = stale {
            handle.close().await;
        }
        opened
    }

    async fn open_configured(storage: &dyn Storage) -> Result<DatabaseHandle, CredsError> {
        let config: ConnectionConfig = storage::read_json(storage, CONNECTION_CONFIG_KEY)
            .await?
            .ok_or(CredsError::NotConfigured)?;

        let handle = DatabaseHandle::open(&config).await?;
        info!(
            dialect = ?handle.dialect(),
            max_open = config.max_open_connections,
            max_idle = config.idle_connections(),
            "database handle opened"
        );
        Ok(handle)
    }

    /// Close and discard the cached handle; the next [`acquire`] reconnects.
    ///
    /// [`acquire`]: ConnectionManager::acquire
    pub async fn reset(&self) {
        let taken = self.handle.lock().await.take();
        if let Some(handle) = taken {
            debug!("closing cached database handle");
            handle.close().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
