//! Tracker behaviour against a real SQLite database.
//!
//! Tests:
//! - Insert / unchanged / update lifecycle of one record
//! - Restoration of a record marked deleted
//! - Deletion committed while an update is still queued
//! - Batch commit at the threshold and on shutdown
//! - Scoped trackers flush on every exit path

mod common;

use chrono::Duration;
use common::{fixed_now, jan, TestFixture};
use waymark::storage::query::mark_deleted;
use waymark::storage::{BatchConfig, BatchKind, SqliteStore, StoreConfig};
use waymark::{SqliteTracker, TrackOutcome, Tracker, TrackerError, TrackerFactory};

fn fixed_clock_tracker(factory: &TrackerFactory) -> SqliteTracker {
    let conn = factory.pool().get().expect("pool exhausted");
    Tracker::with_clock(SqliteStore::new(conn, factory.config().batch), fixed_now)
}

#[test]
fn test_record_lifecycle() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());
    let mut tracker = fixed_clock_tracker(&factory);

    assert_eq!(
        tracker.track("libA", "rec1", jan(1)).unwrap(),
        TrackOutcome::Inserted
    );
    assert_eq!(tracker.first_seen().unwrap(), "2024-06-01T08:00:00Z");
    assert_eq!(tracker.last_seen().unwrap(), "2024-06-01T08:00:00Z");

    // Another record in between so the next call is not short-circuited
    tracker.track("libA", "rec2", jan(1)).unwrap();
    assert_eq!(
        tracker.track("libA", "rec1", jan(1)).unwrap(),
        TrackOutcome::Unchanged
    );

    tracker.track("libA", "rec2", jan(1)).unwrap();
    assert_eq!(
        tracker.track("libA", "rec1", jan(2)).unwrap(),
        TrackOutcome::Updated
    );
    tracker.shutdown();

    let row = fixture.record("libA", "rec1").expect("row missing");
    assert_eq!(row.first_seen, Some(fixed_now()));
    assert_eq!(row.last_seen, Some(fixed_now()));
    assert_eq!(row.last_changed, Some(jan(2)));
    assert!(row.deleted_at.is_none());
    assert_eq!(fixture.row_count(), 2);
}

#[test]
fn test_committed_row_is_updated_across_trackers() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    factory
        .scoped(|tracker| tracker.track("libA", "rec1", jan(1)).map(|_| ()))
        .unwrap();
    let first = fixture.record("libA", "rec1").unwrap();

    let outcome = factory
        .scoped(|tracker| tracker.track("libA", "rec1", jan(1) + Duration::milliseconds(500)))
        .unwrap();
    assert_eq!(outcome, TrackOutcome::Unchanged);

    let outcome = factory
        .scoped(|tracker| tracker.track("libA", "rec1", jan(3)))
        .unwrap();
    assert_eq!(outcome, TrackOutcome::Updated);

    let row = fixture.record("libA", "rec1").unwrap();
    assert_eq!(row.first_seen, first.first_seen);
    assert_eq!(row.last_changed, Some(jan(3)));
}

#[test]
fn test_deleted_record_is_restored() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    factory
        .scoped(|tracker| tracker.track("libA", "rec1", jan(1)).map(|_| ()))
        .unwrap();
    let original = fixture.record("libA", "rec1").unwrap();
    assert!(mark_deleted(&fixture.inspect(), "libA", "rec1", jan(5)).unwrap());

    let mut tracker = fixed_clock_tracker(&factory);
    assert_eq!(
        tracker.track("libA", "rec1", jan(1)).unwrap(),
        TrackOutcome::Restored
    );
    tracker.shutdown();

    let row = fixture.record("libA", "rec1").unwrap();
    assert!(row.deleted_at.is_none());
    assert_eq!(row.first_seen, original.first_seen);
    assert_eq!(row.last_seen, Some(fixed_now()));
    assert_eq!(row.last_changed, Some(jan(1)));
}

#[test]
fn test_deletion_during_pending_update_is_restored() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    factory
        .scoped(|tracker| tracker.track("libA", "rec1", jan(1)).map(|_| ()))
        .unwrap();

    let mut tracker = fixed_clock_tracker(&factory);
    assert_eq!(
        tracker.track("libA", "rec1", jan(2)).unwrap(),
        TrackOutcome::Updated
    );
    assert_eq!(tracker.store().pending(BatchKind::Update), 1);

    // Deleted by another process while the update is still queued
    assert!(mark_deleted(&fixture.inspect(), "libA", "rec1", jan(5)).unwrap());

    tracker.track("libA", "other", jan(1)).unwrap();
    assert_eq!(
        tracker.track("libA", "rec1", jan(2)).unwrap(),
        TrackOutcome::Restored
    );
    tracker.shutdown();

    let row = fixture.record("libA", "rec1").unwrap();
    assert!(row.deleted_at.is_none());
    assert_eq!(row.last_seen, Some(fixed_now()));
    assert_eq!(row.last_changed, Some(jan(2)));
}

#[test]
fn test_insert_batch_commits_at_threshold() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());
    let mut tracker = factory.tracker().unwrap();

    for i in 0..99 {
        tracker.track("libA", &format!("rec{i}"), jan(1)).unwrap();
    }
    assert_eq!(tracker.store().pending(BatchKind::Insert), 99);
    assert_eq!(fixture.row_count(), 0);

    tracker.track("libA", "rec99", jan(1)).unwrap();
    assert_eq!(tracker.store().pending(BatchKind::Insert), 0);
    assert_eq!(fixture.row_count(), 100);

    tracker.shutdown();
}

#[test]
fn test_shutdown_flushes_pending_inserts() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());
    let mut tracker = factory.tracker().unwrap();

    tracker.track("libA", "rec1", jan(1)).unwrap();
    assert_eq!(fixture.row_count(), 0);
    assert_eq!(tracker.store().pending(BatchKind::Update), 0);

    tracker.shutdown();
    assert_eq!(fixture.row_count(), 1);
    assert_eq!(tracker.store().pending(BatchKind::Insert), 0);
}

#[test]
fn test_record_seen_twice_within_one_batch() {
    let fixture = TestFixture::new();
    let config = StoreConfig {
        batch: BatchConfig::from_config(2),
        ..StoreConfig::default()
    };
    let factory = fixture.factory(config);
    let mut tracker = factory.tracker().unwrap();

    tracker.track("libA", "rec1", jan(1)).unwrap();
    tracker.track("libA", "rec2", jan(1)).unwrap(); // insert batch commits here
    tracker.track("libA", "rec3", jan(1)).unwrap();
    assert_eq!(
        tracker.track("libA", "rec3", jan(1)).unwrap(),
        TrackOutcome::Repeated
    );
    tracker.track("libA", "rec1", jan(1)).unwrap();
    // rec3 is still pending but must be found, not inserted again
    assert_eq!(
        tracker.track("libA", "rec3", jan(4)).unwrap(),
        TrackOutcome::Updated
    );
    tracker.shutdown();

    assert_eq!(fixture.row_count(), 3);
    let row = fixture.record("libA", "rec3").unwrap();
    assert_eq!(row.last_changed, Some(jan(4)));
}

#[test]
fn test_scoped_tracker_flushes_after_error() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    let result: Result<(), TrackerError> = factory.scoped(|tracker| {
        tracker.track("libA", "rec1", jan(1))?;
        tracker.track("libA", "", jan(1))?;
        Ok(())
    });

    assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
    assert_eq!(fixture.row_count(), 1);
}
