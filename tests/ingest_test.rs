//! Ingest runner tests.
//!
//! Tests:
//! - Events are tracked across several workers and committed on completion
//! - Malformed lines are counted and skipped
//! - A shutdown signal stops reading but still flushes trackers
//! - More workers than pooled connections still completes

mod common;

use common::{jan, TestFixture};
use tokio::sync::watch;
use waymark::ingest::{run_ingest, IngestOptions};
use waymark::StoreConfig;

fn event(namespace: &str, id: &str, changed_at: &str) -> String {
    format!(r#"{{"namespace":"{namespace}","id":"{id}","changed_at":"{changed_at}"}}"#)
}

fn options() -> IngestOptions {
    IngestOptions {
        workers: 3,
        channel_size: 8,
    }
}

#[tokio::test]
async fn test_ingest_tracks_events_across_workers() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    let mut lines = Vec::new();
    for i in 0..50 {
        lines.push(event("libA", &format!("rec{i}"), "2020-01-01T00:00:00Z"));
    }
    // Repeat immediately: same worker, short-circuited
    lines.push(event("libA", "rec49", "2020-01-01T00:00:00Z"));
    lines.push(String::new());
    // Later change of an existing record
    lines.push(event("libA", "rec0", "2020-01-02T00:00:00Z"));
    let input = lines.join("\n");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = run_ingest(factory, input.as_bytes(), options(), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(summary.lines, 53);
    assert_eq!(summary.malformed, 0);
    assert_eq!(summary.counts.inserted, 50);
    assert_eq!(summary.counts.repeated, 1);
    assert_eq!(summary.counts.updated, 1);
    assert_eq!(summary.counts.failed, 0);
    assert!(!summary.interrupted);
    assert_eq!(summary.run_id.len(), 36);

    assert_eq!(fixture.row_count(), 50);
    let row = fixture.record("libA", "rec0").unwrap();
    assert_eq!(row.last_changed, Some(jan(2)));
}

#[tokio::test]
async fn test_ingest_skips_malformed_lines() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    let input = [
        event("libA", "rec1", "2020-01-01T00:00:00Z"),
        "not json".to_string(),
        r#"{"namespace":"libA","id":"rec2"}"#.to_string(),
        event("libA", "rec2", "2020-01-01T00:00:00Z"),
    ]
    .join("\n");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = run_ingest(factory, input.as_bytes(), options(), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(summary.lines, 4);
    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.counts.inserted, 2);
    assert_eq!(fixture.row_count(), 2);
}

#[tokio::test]
async fn test_ingest_counts_invalid_identities_as_failed() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());

    let input = [
        event("", "rec1", "2020-01-01T00:00:00Z"),
        event("libA", "rec1", "2020-01-01T00:00:00Z"),
    ]
    .join("\n");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = run_ingest(factory, input.as_bytes(), options(), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.inserted, 1);
    assert_eq!(fixture.row_count(), 1);
}

#[tokio::test]
async fn test_ingest_with_more_workers_than_connections() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig {
        pool_size: 1,
        ..StoreConfig::default()
    });

    let input = (0..200)
        .map(|i| event("libA", &format!("rec{i}"), "2020-01-01T00:00:00Z"))
        .collect::<Vec<_>>()
        .join("\n");

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        run_ingest(factory, input.as_bytes(), options(), shutdown_rx),
    )
    .await
    .expect("ingest stalled")
    .unwrap();

    assert_eq!(summary.counts.inserted, 200);
    assert_eq!(summary.counts.failed, 0);
    assert_eq!(fixture.row_count(), 200);
}

#[tokio::test]
async fn test_ingest_stops_reading_after_shutdown_signal() {
    let fixture = TestFixture::new();
    let factory = fixture.factory(StoreConfig::default());
    let input = event("libA", "rec1", "2020-01-01T00:00:00Z");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let summary = run_ingest(factory, input.as_bytes(), options(), shutdown_rx)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.lines, 0);
    assert_eq!(fixture.row_count(), 0);
}
