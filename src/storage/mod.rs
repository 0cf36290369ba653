//! SQLite storage layer for Waymark.
//!
//! Provides:
//! - `change_tracker` schema and connection pragmas
//! - Batched insert/update store backing each tracker
//! - Connection pool handing one connection to each worker
//! - Read and maintenance queries for downstream consumers

pub mod batch;
pub mod pool;
pub mod query;
pub mod schema;
pub mod sqlite;

use std::time::Duration;
use thiserror::Error;

use crate::record::{RecordTimes, RowWrite};

pub use batch::{BatchConfig, BatchKind};
pub use pool::ConnectionPool;
pub use sqlite::SqliteStore;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Storage settings shared by every tracker a factory hands out.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub batch: BatchConfig,
    pub busy_timeout: Duration,
    /// Maximum number of pooled connections (one per worker)
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            busy_timeout: schema::DEFAULT_BUSY_TIMEOUT,
            pool_size: 8,
        }
    }
}

/// The narrow storage interface the tracker drives.
///
/// `insert` and `update` may defer the actual write; `lookup` must still
/// observe rows queued through the same store.
pub trait RecordStore {
    /// Point lookup by `(namespace, id)`.
    fn lookup(&mut self, namespace: &str, id: &str) -> Result<Option<RecordTimes>, StoreError>;

    /// Queue creation of a new row.
    fn insert(&mut self, row: RowWrite) -> Result<(), StoreError>;

    /// Queue an update of an existing row.
    fn update(&mut self, row: RowWrite) -> Result<(), StoreError>;

    /// Flush everything pending and release prepared resources.
    ///
    /// Never fails; problems are logged. Calling it again is a no-op.
    fn shutdown(&mut self);
}
