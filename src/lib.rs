//! Waymark: per-record first-seen / last-seen / last-changed tracking.
//!
//! For every record an indexing pipeline processes, Waymark keeps one row in
//! the `change_tracker` table recording when the record was first seen, when
//! it was last seen, and when its content last changed, so that downstream
//! consumers can ask "what changed since T".
//!
//! # Architecture
//!
//! - **Tracker**: per-worker state machine deciding insert / update / no-op
//! - **Batched writes**: inserts and updates commit in groups of 100
//! - **One connection per worker**: a factory hands out trackers over a pool
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`ingest`]: Bulk event ingest through a worker pool
//! - [`observability`]: Tracing and metrics setup
//! - [`record`]: Record identity and timestamp types
//! - [`storage`]: SQLite schema, batching, pool and queries
//! - [`tracker`]: The change-tracking state machine

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // tracker::TrackerError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod config;
pub mod ingest;
pub mod observability;
pub mod record;
pub mod storage;
pub mod tracker;

use uuid::Uuid;

pub use record::{RecordKey, RecordTimes, TrackedRecord};
pub use storage::{RecordStore, StoreConfig, StoreError};
pub use tracker::{SqliteTracker, TrackOutcome, Tracker, TrackerError, TrackerFactory};

/// Generate a new UUIDv7 (time-sortable) ingest run ID.
///
/// # Example
///
/// ```
/// let id = waymark::generate_run_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_run_id() -> String {
    Uuid::now_v7().to_string()
}
