//! `change_tracker` table definition and connection setup.
//!
//! The table is the persisted contract other tools read:
//!
//! | column               | meaning                     |
//! |----------------------|-----------------------------|
//! | `core`               | namespace                   |
//! | `id`                 | record identifier           |
//! | `first_indexed`      | first seen                  |
//! | `last_indexed`       | last seen                   |
//! | `last_record_change` | content change time         |
//! | `deleted`            | deletion marker (nullable)  |

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::StoreError;

/// Table and index creation. Safe to run on every open.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS change_tracker (
    core TEXT NOT NULL,
    id TEXT NOT NULL,
    first_indexed TIMESTAMP,
    last_indexed TIMESTAMP,
    last_record_change TIMESTAMP,
    deleted TIMESTAMP NULL,
    PRIMARY KEY (core, id)
);

CREATE INDEX IF NOT EXISTS idx_change_tracker_last_change
    ON change_tracker (core, last_record_change);

CREATE INDEX IF NOT EXISTS idx_change_tracker_deleted
    ON change_tracker (core, deleted);
"#;

pub const SELECT_TIMES_SQL: &str = r#"
SELECT first_indexed, last_indexed, last_record_change, deleted
FROM change_tracker WHERE core = ?1 AND id = ?2
"#;

/// Deletion marker of a committed row.
pub const SELECT_DELETED_SQL: &str = r#"
SELECT deleted FROM change_tracker WHERE core = ?1 AND id = ?2
"#;

/// Insert a new row. A row created concurrently by another worker is
/// overwritten in place, keeping its `first_indexed`.
pub const INSERT_SQL: &str = r#"
INSERT INTO change_tracker (core, id, first_indexed, last_indexed, last_record_change)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (core, id) DO UPDATE SET
    last_indexed = excluded.last_indexed,
    last_record_change = excluded.last_record_change,
    deleted = NULL
"#;

pub const UPDATE_SQL: &str = r#"
UPDATE change_tracker
SET first_indexed = ?1, last_indexed = ?2, last_record_change = ?3, deleted = NULL
WHERE core = ?4 AND id = ?5
"#;

/// Default time a writer waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply connection pragmas for concurrent tracker workers.
///
/// WAL lets readers proceed while one worker commits a batch; the busy
/// timeout serializes competing batch commits.
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    // journal_mode answers with the resulting mode
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Create the `change_tracker` table if it does not exist.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Open a single configured connection with the schema in place.
///
/// Used by tools that query the table outside a tracker pool.
pub fn open_connection<P: AsRef<Path>>(
    db_path: P,
    busy_timeout: Duration,
) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn, busy_timeout)?;
    initialize_schema(&conn)?;
    Ok(conn)
}
