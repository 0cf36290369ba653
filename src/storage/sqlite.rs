//! SQLite-backed [`RecordStore`] with batched commits.
//!
//! Writes are queued in a [`Batcher`] and executed together, one
//! transaction per batch, when a batch fills up or on shutdown. A store
//! dropped without an explicit shutdown flushes from `Drop`.

use rusqlite::{params, Connection, OptionalExtension};
use std::ops::DerefMut;
use std::time::Instant;

use super::batch::{BatchConfig, BatchKind, Batcher};
use super::pool::PooledSqlite;
use super::schema::{INSERT_SQL, SELECT_DELETED_SQL, SELECT_TIMES_SQL, UPDATE_SQL};
use super::{RecordStore, StoreError};
use crate::observability::metrics::record_flush;
use crate::record::{RecordTimes, RowWrite};

/// Batched store over one SQLite connection.
///
/// `C` is anything that hands out a mutable [`Connection`]: a pooled
/// connection in production, a plain one in tests.
pub struct SqliteStore<C = PooledSqlite>
where
    C: DerefMut<Target = Connection>,
{
    conn: C,
    batcher: Batcher,
    closed: bool,
}

impl<C> SqliteStore<C>
where
    C: DerefMut<Target = Connection>,
{
    /// Wrap a connection whose schema is already initialized.
    pub fn new(conn: C, config: BatchConfig) -> Self {
        Self {
            conn,
            batcher: Batcher::new(config),
            closed: false,
        }
    }

    /// Number of rows waiting in the given batch.
    pub fn pending(&self, kind: BatchKind) -> usize {
        self.batcher.pending(kind)
    }

    /// The underlying connection, for reads outside the batch cycle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute and commit the batch of `kind` if it is full, or if
    /// `force` is set and it is not empty.
    ///
    /// A batch that fails to commit is rolled back and discarded.
    pub fn maybe_flush(&mut self, kind: BatchKind, force: bool) -> Result<(), StoreError> {
        if !self.batcher.should_flush(kind, force) {
            return Ok(());
        }

        let rows = self.batcher.take(kind);
        let started = Instant::now();
        let result = execute_batch(&mut self.conn, kind, &rows);
        let elapsed = started.elapsed();
        record_flush(kind, rows.len(), elapsed.as_secs_f64(), result.is_ok());

        match result {
            Ok(()) => {
                tracing::debug!(
                    kind = %kind,
                    rows = rows.len(),
                    forced = force,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Committed batch"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    rows = rows.len(),
                    error = %e,
                    "Batch commit failed, batch discarded"
                );
                Err(e.into())
            }
        }
    }
}

fn execute_batch(conn: &mut Connection, kind: BatchKind, rows: &[RowWrite]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        match kind {
            BatchKind::Insert => {
                let mut stmt = tx.prepare_cached(INSERT_SQL)?;
                for row in rows {
                    stmt.execute(params![
                        row.key.namespace,
                        row.key.id,
                        row.first_seen,
                        row.last_seen,
                        row.last_changed,
                    ])?;
                }
            }
            BatchKind::Update => {
                let mut stmt = tx.prepare_cached(UPDATE_SQL)?;
                for row in rows {
                    stmt.execute(params![
                        row.first_seen,
                        row.last_seen,
                        row.last_changed,
                        row.key.namespace,
                        row.key.id,
                    ])?;
                }
            }
        }
    }
    tx.commit()
}

impl<C> RecordStore for SqliteStore<C>
where
    C: DerefMut<Target = Connection>,
{
    fn lookup(&mut self, namespace: &str, id: &str) -> Result<Option<RecordTimes>, StoreError> {
        match self.batcher.pending_row(namespace, id) {
            Some((BatchKind::Insert, times)) => return Ok(Some(times)),
            Some((BatchKind::Update, mut times)) => {
                // The row is committed, so a deletion marker may have been
                // set on it since the update was queued
                let mut stmt = self.conn.prepare_cached(SELECT_DELETED_SQL)?;
                times.deleted_at = stmt
                    .query_row(params![namespace, id], |row| row.get(0))
                    .optional()?
                    .flatten();
                return Ok(Some(times));
            }
            None => {}
        }

        let mut stmt = self.conn.prepare_cached(SELECT_TIMES_SQL)?;
        let times = stmt
            .query_row(params![namespace, id], |row| {
                Ok(RecordTimes {
                    first_seen: row.get(0)?,
                    last_seen: row.get(1)?,
                    last_changed: row.get(2)?,
                    deleted_at: row.get(3)?,
                })
            })
            .optional()?;
        Ok(times)
    }

    fn insert(&mut self, row: RowWrite) -> Result<(), StoreError> {
        self.batcher.enqueue(BatchKind::Insert, row);
        self.maybe_flush(BatchKind::Insert, false)
    }

    fn update(&mut self, row: RowWrite) -> Result<(), StoreError> {
        // An update to a row whose insert has not been committed yet must
        // not run ahead of that insert.
        let Some(row) = self.batcher.fold_into_pending_insert(row) else {
            return Ok(());
        };
        self.batcher.enqueue(BatchKind::Update, row);
        self.maybe_flush(BatchKind::Update, false)
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for kind in BatchKind::ALL {
            if let Err(e) = self.maybe_flush(kind, true) {
                tracing::error!(kind = %kind, error = %e, "Flush failed during store shutdown");
            }
        }
        self.conn.flush_prepared_statement_cache();
        tracing::debug!("Tracker store shut down");
    }
}

impl<C> Drop for SqliteStore<C>
where
    C: DerefMut<Target = Connection>,
{
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("Tracker store dropped without shutdown, flushing pending batches");
            self.shutdown();
        }
    }
}
