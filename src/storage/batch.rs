//! Group commit batch logic for tracker writes.
//!
//! Inserts and updates are collected in two independent batches. A batch
//! is committed as one transaction once it holds `max_batch_size` rows, or
//! earlier when a flush is forced (shutdown). Rows waiting in a batch stay
//! visible to lookups through [`Batcher::pending_row`].

use crate::record::{RecordTimes, RowWrite};

/// Default number of rows per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Which of the two pending batches a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Insert,
    Update,
}

impl BatchKind {
    /// Both kinds, in shutdown flush order.
    pub const ALL: [BatchKind; 2] = [BatchKind::Insert, BatchKind::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            BatchKind::Insert => "insert",
            BatchKind::Update => "update",
        }
    }
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for batch commits.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Number of pending rows that triggers a commit
    pub max_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig from application config values.
    ///
    /// A size of zero is treated as one (commit every row).
    pub fn from_config(batch_size: usize) -> Self {
        Self {
            max_batch_size: batch_size.max(1),
        }
    }

    /// Create a test config with a small batch size.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self { max_batch_size: 3 }
    }
}

/// Batch accumulator for write operations.
///
/// Collects items until the batch is full (max_batch_size) or a flush
/// is forced.
#[derive(Debug)]
pub struct BatchAccumulator<T> {
    config: BatchConfig,
    items: Vec<T>,
}

impl<T> BatchAccumulator<T> {
    /// Create a new batch accumulator with the given configuration.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            items: Vec::with_capacity(config.max_batch_size),
        }
    }

    /// Add an item to the batch.
    ///
    /// Returns true if the batch is now ready to flush.
    pub fn push(&mut self, item: T) -> bool {
        self.items.push(item);
        self.is_ready()
    }

    /// Check if the batch is full.
    pub fn is_ready(&self) -> bool {
        self.items.len() >= self.config.max_batch_size
    }

    /// Check if the batch should be flushed now.
    ///
    /// A forced flush of an empty batch is a no-op.
    pub fn should_flush(&self, force: bool) -> bool {
        self.is_ready() || (force && !self.items.is_empty())
    }

    /// Drain the batch, returning all accumulated items.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::replace(
            &mut self.items,
            Vec::with_capacity(self.config.max_batch_size),
        )
    }

    /// Most recently pushed item matching `pred`.
    pub fn find_last<P>(&self, pred: P) -> Option<&T>
    where
        P: Fn(&T) -> bool,
    {
        self.items.iter().rev().find(|item| pred(item))
    }

    /// Mutable access to the most recently pushed item matching `pred`.
    pub fn find_last_mut<P>(&mut self, pred: P) -> Option<&mut T>
    where
        P: Fn(&T) -> bool,
    {
        self.items.iter_mut().rev().find(|item| pred(item))
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the current batch size.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// The pair of pending insert and update batches owned by one store.
#[derive(Debug)]
pub struct Batcher {
    inserts: BatchAccumulator<RowWrite>,
    updates: BatchAccumulator<RowWrite>,
}

impl Batcher {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            inserts: BatchAccumulator::new(config),
            updates: BatchAccumulator::new(config),
        }
    }

    fn batch(&self, kind: BatchKind) -> &BatchAccumulator<RowWrite> {
        match kind {
            BatchKind::Insert => &self.inserts,
            BatchKind::Update => &self.updates,
        }
    }

    fn batch_mut(&mut self, kind: BatchKind) -> &mut BatchAccumulator<RowWrite> {
        match kind {
            BatchKind::Insert => &mut self.inserts,
            BatchKind::Update => &mut self.updates,
        }
    }

    /// Queue a row. Returns true if that kind's batch is now full.
    pub fn enqueue(&mut self, kind: BatchKind, row: RowWrite) -> bool {
        self.batch_mut(kind).push(row)
    }

    /// Fold an update into a still-pending insert for the same record.
    ///
    /// Returns the row back when there is no pending insert to fold into.
    pub fn fold_into_pending_insert(&mut self, row: RowWrite) -> Option<RowWrite> {
        match self.inserts.find_last_mut(|pending| pending.key == row.key) {
            Some(pending) => {
                *pending = row;
                None
            }
            None => Some(row),
        }
    }

    /// Whether the given batch should be executed now.
    pub fn should_flush(&self, kind: BatchKind, force: bool) -> bool {
        self.batch(kind).should_flush(force)
    }

    /// Take every pending row of one kind, resetting its count to zero.
    pub fn take(&mut self, kind: BatchKind) -> Vec<RowWrite> {
        self.batch_mut(kind).drain()
    }

    /// Number of rows waiting in the given batch.
    pub fn pending(&self, kind: BatchKind) -> usize {
        self.batch(kind).len()
    }

    /// Latest not-yet-committed state of a record, if any write is pending,
    /// together with the batch holding it.
    ///
    /// Pending updates are newer than pending inserts for the same key.
    /// The returned times never carry a deletion marker.
    pub fn pending_row(&self, namespace: &str, id: &str) -> Option<(BatchKind, RecordTimes)> {
        let matches = |row: &RowWrite| row.key.matches(namespace, id);
        if let Some(row) = self.updates.find_last(matches) {
            return Some((BatchKind::Update, row.times()));
        }
        self.inserts
            .find_last(matches)
            .map(|row| (BatchKind::Insert, row.times()))
    }
}
