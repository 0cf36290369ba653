//! Ingest run: input reader plus one blocking tracker worker per slot.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{IngestError, IngestOptions, IngestSummary, RecordEvent, TrackCounts};
use crate::generate_run_id;
use crate::tracker::TrackerFactory;

/// Track every event in `input` and return per-outcome totals.
///
/// Stops reading early when `shutdown_rx` turns true; events already
/// queued are still tracked and every tracker is shut down (flushing its
/// pending batches) before this returns.
///
/// # Errors
///
/// Fails when the input cannot be read or a worker cannot obtain a
/// connection. Individual track failures are counted, not returned.
///
/// Each worker holds one pooled connection for the whole run, so the
/// worker count is capped at the pool size.
pub async fn run_ingest<R>(
    factory: TrackerFactory,
    input: R,
    options: IngestOptions,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<IngestSummary, IngestError>
where
    R: AsyncBufRead + Unpin,
{
    let run_id = generate_run_id();
    let workers = worker_count(&options, factory.config().pool_size);
    tracing::info!(run_id = %run_id, workers, "Starting ingest");

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for index in 0..workers {
        let (tx, rx) = mpsc::channel(options.channel_size.max(1));
        senders.push(tx);
        handles.push(spawn_worker(index, factory.clone(), rx));
    }

    let mut summary = IngestSummary {
        run_id,
        lines: 0,
        malformed: 0,
        counts: TrackCounts::default(),
        interrupted: *shutdown_rx.borrow(),
    };

    let mut lines = input.lines();
    let read_result: Result<(), IngestError> = async {
        if summary.interrupted {
            return Ok(());
        }
        loop {
            tokio::select! {
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Shutdown requested, stop reading input");
                        summary.interrupted = true;
                        break;
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    summary.lines += 1;
                    let event = match RecordEvent::parse_line(&line) {
                        Ok(Some(event)) => event,
                        Ok(None) => continue,
                        Err(e) => {
                            summary.malformed += 1;
                            tracing::warn!(line = summary.lines, error = %e, "Skipping malformed event");
                            continue;
                        }
                    };
                    let slot = event.partition(senders.len());
                    if senders[slot].send(event).await.is_err() {
                        tracing::error!(worker = slot, "Worker stopped accepting events");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    // Closing the queues lets workers drain and shut down their trackers
    drop(senders);

    let mut worker_error = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(counts)) => summary.counts.merge(&counts),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Worker failed");
                worker_error.get_or_insert(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "Worker task panicked");
                worker_error.get_or_insert(e.into());
            }
        }
    }

    read_result?;
    if let Some(e) = worker_error {
        return Err(e);
    }

    tracing::info!(
        run_id = %summary.run_id,
        lines = summary.lines,
        malformed = summary.malformed,
        inserted = summary.counts.inserted,
        updated = summary.counts.updated,
        restored = summary.counts.restored,
        unchanged = summary.counts.unchanged,
        repeated = summary.counts.repeated,
        failed = summary.counts.failed,
        interrupted = summary.interrupted,
        "Ingest complete"
    );
    Ok(summary)
}

fn worker_count(options: &IngestOptions, pool_size: u32) -> usize {
    let requested = options.workers.max(1);
    let available = usize::try_from(pool_size.max(1)).unwrap_or(usize::MAX);
    if requested > available {
        tracing::warn!(
            requested,
            pool_size = available,
            "More workers than pooled connections, capping worker count"
        );
    }
    requested.min(available)
}

fn spawn_worker(
    index: usize,
    factory: TrackerFactory,
    mut rx: mpsc::Receiver<RecordEvent>,
) -> JoinHandle<Result<TrackCounts, IngestError>> {
    tokio::task::spawn_blocking(move || {
        let _span = tracing::info_span!("worker", index).entered();
        let mut tracker = factory.tracker()?;
        let mut counts = TrackCounts::default();

        while let Some(event) = rx.blocking_recv() {
            match tracker.track(&event.namespace, &event.id, event.changed_at) {
                Ok(outcome) => counts.record(outcome),
                Err(e) => {
                    counts.failed += 1;
                    tracing::error!(
                        namespace = %event.namespace,
                        id = %event.id,
                        error = %e,
                        "Failed to track event"
                    );
                }
            }
        }

        tracker.shutdown();
        tracing::debug!(events = counts.total(), "Worker finished");
        Ok(counts)
    })
}
