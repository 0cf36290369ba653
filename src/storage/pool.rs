//! Connection pool for tracker workers.
//!
//! Uses r2d2 with r2d2_sqlite. Each worker checks out one connection for
//! the lifetime of its tracker; SQLite WAL mode lets queries run while a
//! worker commits.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use super::schema::{apply_pragmas, initialize_schema};
use super::StoreError;

/// Pooled SQLite connection as handed to a worker.
pub type PooledSqlite = PooledConnection<SqliteConnectionManager>;

/// Connection pool over one `change_tracker` database file.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    /// Create a new pool for the given database path.
    ///
    /// The schema is created on the first connection if missing.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file
    /// * `max_size` - Maximum number of connections in the pool
    /// * `busy_timeout` - How long a connection waits on a locked database
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        max_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_customizer(Box::new(TrackerConnectionCustomizer { busy_timeout }))
            .build(manager)?;

        initialize_schema(&*pool.get()?)?;

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledSqlite, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Get the current pool state for monitoring.
    pub fn state(&self) -> r2d2::State {
        self.pool.state()
    }
}

/// Connection customizer that applies tracker pragmas.
#[derive(Debug)]
struct TrackerConnectionCustomizer {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error>
    for TrackerConnectionCustomizer
{
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn, self.busy_timeout)
    }
}
