//! Hands each worker its own tracker over its own pooled connection.

use std::path::Path;

use super::{Tracker, TrackerError};
use crate::storage::{ConnectionPool, SqliteStore, StoreConfig, StoreError};

/// Tracker over a pooled SQLite connection.
pub type SqliteTracker = Tracker<SqliteStore>;

/// Builds trackers that share a database but nothing else.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Clone)]
pub struct TrackerFactory {
    pool: ConnectionPool,
    config: StoreConfig,
}

impl TrackerFactory {
    pub fn new(pool: ConnectionPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Open (creating if needed) the database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P, config: StoreConfig) -> Result<Self, StoreError> {
        let pool = ConnectionPool::new(db_path, config.pool_size, config.busy_timeout)?;
        tracing::info!(
            pool_size = config.pool_size,
            batch_size = config.batch.max_batch_size,
            "Opened tracker database"
        );
        Ok(Self::new(pool, config))
    }

    /// Check out a connection and wrap it in a fresh tracker.
    ///
    /// The connection returns to the pool when the tracker is dropped;
    /// pending writes are flushed at the latest at that point.
    pub fn tracker(&self) -> Result<SqliteTracker, StoreError> {
        let conn = self.pool.get()?;
        Ok(Tracker::new(SqliteStore::new(conn, self.config.batch)))
    }

    /// Run `f` with a dedicated tracker and shut it down afterwards,
    /// whether `f` succeeded or not.
    pub fn scoped<F, T>(&self, f: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut SqliteTracker) -> Result<T, TrackerError>,
    {
        let mut tracker = self.tracker()?;
        let result = f(&mut tracker);
        tracker.shutdown();
        result
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}
