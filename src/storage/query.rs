//! Read and maintenance queries over `change_tracker`.
//!
//! These run outside any tracker's batch cycle and only see committed rows.
//! `mark_deleted` is the deletion collaborator: trackers never set the
//! marker themselves, they only clear it.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::StoreError;
use crate::record::TrackedRecord;

const RECORD_COLUMNS: &str =
    "core, id, first_indexed, last_indexed, last_record_change, deleted";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedRecord> {
    Ok(TrackedRecord {
        namespace: row.get(0)?,
        id: row.get(1)?,
        first_seen: row.get(2)?,
        last_seen: row.get(3)?,
        last_changed: row.get(4)?,
        deleted_at: row.get(5)?,
    })
}

/// Fetch one row by `(namespace, id)`.
pub fn get_record(
    conn: &Connection,
    namespace: &str,
    id: &str,
) -> Result<Option<TrackedRecord>, StoreError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM change_tracker WHERE core = ?1 AND id = ?2");
    let record = conn
        .query_row(&sql, params![namespace, id], record_from_row)
        .optional()?;
    Ok(record)
}

/// Live records in `namespace` whose content changed after `since`,
/// oldest change first.
///
/// `limit` of `None` returns every match.
pub fn changed_since(
    conn: &Connection,
    namespace: &str,
    since: DateTime<Utc>,
    limit: Option<u32>,
) -> Result<Vec<TrackedRecord>, StoreError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM change_tracker \
         WHERE core = ?1 AND last_record_change > ?2 AND deleted IS NULL \
         ORDER BY last_record_change ASC, id ASC LIMIT ?3"
    );
    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map_or(-1, i64::from);
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![namespace, since, limit], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Records in `namespace` marked deleted after `since`, oldest first.
pub fn deleted_since(
    conn: &Connection,
    namespace: &str,
    since: DateTime<Utc>,
) -> Result<Vec<TrackedRecord>, StoreError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM change_tracker \
         WHERE core = ?1 AND deleted > ?2 \
         ORDER BY deleted ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![namespace, since], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Set the deletion marker on an existing row.
///
/// Returns false when no such row exists. A row already marked keeps its
/// original deletion time.
pub fn mark_deleted(
    conn: &Connection,
    namespace: &str,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE change_tracker SET deleted = COALESCE(deleted, ?3) WHERE core = ?1 AND id = ?2",
        params![namespace, id, at],
    )?;
    if changed > 0 {
        tracing::info!(namespace, id, "Marked record deleted");
    }
    Ok(changed > 0)
}

/// Row totals for one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceCounts {
    pub namespace: String,
    pub active: i64,
    pub deleted: i64,
}

/// Active and deleted row totals per namespace, by namespace name.
pub fn namespace_counts(conn: &Connection) -> Result<Vec<NamespaceCounts>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT core, \
                SUM(CASE WHEN deleted IS NULL THEN 1 ELSE 0 END), \
                SUM(CASE WHEN deleted IS NULL THEN 0 ELSE 1 END) \
         FROM change_tracker GROUP BY core ORDER BY core ASC",
    )?;
    let counts = stmt
        .query_map([], |row| {
            Ok(NamespaceCounts {
                namespace: row.get(0)?,
                active: row.get(1)?,
                deleted: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}
