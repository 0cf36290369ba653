//! Tracked record types shared by the tracker, storage and query layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Format used by [`format_timestamp`]: second precision, UTC, trailing `Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render a timestamp the way downstream consumers expect (`2020-01-01T00:00:00Z`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Identity of a tracked record: `(namespace, id)`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct RecordKey {
    pub namespace: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Check whether this key names the given record.
    pub fn matches(&self, namespace: &str, id: &str) -> bool {
        self.namespace == namespace && self.id == id
    }
}

/// The four mutable timestamps of a `change_tracker` row.
///
/// Every field is optional because rows may be written by other tools;
/// rows created through the tracker always carry the first three.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordTimes {
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A single insert or update destined for the `change_tracker` table.
///
/// Writes always clear the deletion marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowWrite {
    pub key: RecordKey,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
}

impl RowWrite {
    /// The row as a lookup would see it once written.
    pub fn times(&self) -> RecordTimes {
        RecordTimes {
            first_seen: Some(self.first_seen),
            last_seen: Some(self.last_seen),
            last_changed: Some(self.last_changed),
            deleted_at: None,
        }
    }
}

/// A full `change_tracker` row as returned by the query layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedRecord {
    pub namespace: String,
    pub id: String,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TrackedRecord {
    /// Whether the deletion marker is set.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
