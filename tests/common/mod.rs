//! Test utilities for Waymark integration tests.
//!
//! Provides:
//! - Temporary database fixtures
//! - Tracker factory setup
//! - Row inspection helpers

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;
use waymark::observability::tracing::init_test_tracing;
use waymark::storage::query::get_record;
use waymark::storage::schema::{open_connection, DEFAULT_BUSY_TIMEOUT};
use waymark::{StoreConfig, TrackedRecord, TrackerFactory};

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Open a tracker factory over the fixture database.
    pub fn factory(&self, config: StoreConfig) -> TrackerFactory {
        TrackerFactory::open(&self.db_path, config).expect("failed to open factory")
    }

    /// A separate connection for inspecting committed rows.
    pub fn inspect(&self) -> Connection {
        open_connection(&self.db_path, DEFAULT_BUSY_TIMEOUT).expect("failed to open connection")
    }

    /// Committed row for `(namespace, id)`, if any.
    pub fn record(&self, namespace: &str, id: &str) -> Option<TrackedRecord> {
        get_record(&self.inspect(), namespace, id).expect("lookup failed")
    }

    /// Number of committed rows.
    pub fn row_count(&self) -> i64 {
        self.inspect()
            .query_row("SELECT COUNT(*) FROM change_tracker", [], |row| row.get(0))
            .expect("count failed")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Midnight UTC on the given day of January 2020.
pub fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap()
}

/// Fixed "now" for trackers built with a custom clock.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}
