//! Bulk ingest of record events through a pool of tracker workers.
//!
//! Events are read line by line and routed to workers by record identity,
//! so each record is always handled by the same tracker and consecutive
//! sightings of one record short-circuit inside that tracker.

pub mod event;
mod runner;

use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;
use crate::tracker::TrackOutcome;

pub use event::RecordEvent;
pub use runner::run_ingest;

/// Error type for an ingest run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open tracker: {0}")]
    Storage(#[from] StoreError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Number of tracker workers (each holds one connection)
    pub workers: usize,
    /// Bounded queue length in front of each worker
    pub channel_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_size: 1000,
        }
    }
}

/// Per-outcome totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackCounts {
    pub inserted: u64,
    pub updated: u64,
    pub restored: u64,
    pub unchanged: u64,
    pub repeated: u64,
    pub failed: u64,
}

impl TrackCounts {
    pub fn record(&mut self, outcome: TrackOutcome) {
        match outcome {
            TrackOutcome::Inserted => self.inserted += 1,
            TrackOutcome::Updated => self.updated += 1,
            TrackOutcome::Restored => self.restored += 1,
            TrackOutcome::Unchanged => self.unchanged += 1,
            TrackOutcome::Repeated => self.repeated += 1,
        }
    }

    pub fn merge(&mut self, other: &TrackCounts) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.restored += other.restored;
        self.unchanged += other.unchanged;
        self.repeated += other.repeated;
        self.failed += other.failed;
    }

    /// Events that reached a tracker.
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.restored + self.unchanged + self.repeated + self.failed
    }
}

/// Result of one ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub run_id: String,
    /// Input lines read, including blank and malformed ones
    pub lines: u64,
    pub malformed: u64,
    #[serde(flatten)]
    pub counts: TrackCounts,
    /// Input was abandoned because of a shutdown signal
    pub interrupted: bool,
}
