//! Per-record change tracking.
//!
//! A [`Tracker`] decides, for each `(namespace, id, changed_at)` event,
//! whether the stored row must be created, updated, or left alone, and
//! hands the resulting write to its [`RecordStore`].
//!
//! One tracker serves one worker: it owns its store (and so its
//! connection) and keeps the identity and timestamps of the record it
//! handled last. Use [`TrackerFactory`] to obtain one per worker.

mod factory;

pub use factory::{SqliteTracker, TrackerFactory};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::observability::metrics::record_track;
use crate::record::{format_timestamp, RecordKey, RecordTimes, RowWrite};
use crate::storage::{RecordStore, StoreError};

/// Differences up to this many milliseconds are rounding noise, not a
/// content change. Source timestamps carry one-second precision.
pub const CHANGE_TOLERANCE_MS: i64 = 999;

/// Source of "now" for seen-timestamps.
pub type Clock = fn() -> DateTime<Utc>;

/// Error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid record identity: {0}")]
    InvalidInput(&'static str),

    #[error("no record has been tracked yet")]
    NoCurrentRecord,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// What a single [`Tracker::track`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOutcome {
    /// First sighting; a row was queued for insert.
    Inserted,
    /// Content changed; the row was queued for update.
    Updated,
    /// The row carried a deletion marker and was brought back.
    Restored,
    /// Row exists and content is unchanged; nothing written.
    Unchanged,
    /// Same record as the previous call; storage was not touched.
    Repeated,
}

impl TrackOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackOutcome::Inserted => "inserted",
            TrackOutcome::Updated => "updated",
            TrackOutcome::Restored => "restored",
            TrackOutcome::Unchanged => "unchanged",
            TrackOutcome::Repeated => "repeated",
        }
    }

    /// Whether a write was queued.
    pub fn wrote(self) -> bool {
        matches!(
            self,
            TrackOutcome::Inserted | TrackOutcome::Updated | TrackOutcome::Restored
        )
    }
}

/// Stateful change tracker bound to one store.
pub struct Tracker<S: RecordStore> {
    store: S,
    clock: Clock,
    current: Option<RecordKey>,
    times: Option<RecordTimes>,
}

impl<S: RecordStore> Tracker<S> {
    /// Create a tracker over `store` using the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Utc::now)
    }

    /// Create a tracker with a custom clock.
    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self {
            store,
            clock,
            current: None,
            times: None,
        }
    }

    /// Record that `(namespace, id)` was just processed and that its
    /// content last changed at `changed_at`.
    ///
    /// A call for the same record as the previous call returns
    /// [`TrackOutcome::Repeated`] without touching storage.
    ///
    /// # Errors
    ///
    /// Fails on an empty namespace or id, and on any storage failure.
    /// Storage failures are not retried; the cached identity is cleared
    /// so that the caller may retry.
    pub fn track(
        &mut self,
        namespace: &str,
        id: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<TrackOutcome, TrackerError> {
        if namespace.is_empty() {
            return Err(TrackerError::InvalidInput("namespace cannot be empty"));
        }
        if id.is_empty() {
            return Err(TrackerError::InvalidInput("id cannot be empty"));
        }

        let result = if self
            .current
            .as_ref()
            .is_some_and(|key| key.matches(namespace, id))
        {
            Ok(TrackOutcome::Repeated)
        } else {
            let key = RecordKey::new(namespace, id);
            self.current = Some(key.clone());
            self.apply(key, changed_at)
        };

        match result {
            Ok(outcome) => {
                tracing::trace!(namespace, id, outcome = outcome.as_str(), "Tracked record");
                record_track(namespace, outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.current = None;
                self.times = None;
                tracing::warn!(namespace, id, error = %e, "Failed to track record");
                Err(e.into())
            }
        }
    }

    fn apply(
        &mut self,
        key: RecordKey,
        changed_at: DateTime<Utc>,
    ) -> Result<TrackOutcome, StoreError> {
        let Some(stored) = self.store.lookup(&key.namespace, &key.id)? else {
            let now = (self.clock)();
            let row = RowWrite {
                key,
                first_seen: now,
                last_seen: now,
                last_changed: changed_at,
            };
            let times = row.times();
            self.store.insert(row)?;
            self.times = Some(times);
            return Ok(TrackOutcome::Inserted);
        };

        self.times = Some(stored);
        if !needs_update(&stored, changed_at) {
            return Ok(TrackOutcome::Unchanged);
        }

        let now = (self.clock)();
        let row = RowWrite {
            key,
            // Only a row written by someone else can lack first_indexed
            first_seen: stored.first_seen.unwrap_or(now),
            last_seen: now,
            last_changed: changed_at,
        };
        let times = row.times();
        self.store.update(row)?;
        self.times = Some(times);

        Ok(if stored.deleted_at.is_some() {
            TrackOutcome::Restored
        } else {
            TrackOutcome::Updated
        })
    }

    /// First-seen time of the last tracked record, as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn first_seen(&self) -> Result<String, TrackerError> {
        self.times
            .and_then(|t| t.first_seen)
            .map(format_timestamp)
            .ok_or(TrackerError::NoCurrentRecord)
    }

    /// Last-seen time of the last tracked record, as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn last_seen(&self) -> Result<String, TrackerError> {
        self.times
            .and_then(|t| t.last_seen)
            .map(format_timestamp)
            .ok_or(TrackerError::NoCurrentRecord)
    }

    /// Flush pending writes and release storage resources.
    pub fn shutdown(&mut self) {
        self.store.shutdown();
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// A stored row needs a write when it is marked deleted, has no change
/// time, or its change time differs from `changed_at` by a full second.
fn needs_update(stored: &RecordTimes, changed_at: DateTime<Utc>) -> bool {
    if stored.deleted_at.is_some() {
        return true;
    }
    match stored.last_changed {
        Some(previous) => {
            (previous - changed_at).num_milliseconds().abs() > CHANGE_TOLERANCE_MS
        }
        None => true,
    }
}
