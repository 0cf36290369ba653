//! OpenTelemetry metrics for tracking and batch commits.
//!
//! Key metrics:
//! - waymark_track_total: Counter of track calls by outcome and namespace
//! - waymark_batch_flush_total: Counter of batch commits by kind and status
//! - waymark_batch_flush_rows: Histogram of rows per committed batch
//! - waymark_batch_flush_latency_seconds: Histogram of batch commit latency

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::storage::BatchKind;
use crate::tracker::TrackOutcome;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Waymark metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Track calls by outcome.
    pub track_total: Counter<u64>,
    /// Batch commits by kind and status.
    pub flush_total: Counter<u64>,
    /// Rows per batch commit.
    pub flush_rows: Histogram<u64>,
    /// Batch commit latency in seconds.
    pub flush_latency: Histogram<f64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            track_total: meter
                .u64_counter("waymark_track_total")
                .with_description("Track calls by outcome")
                .with_unit("1")
                .init(),
            flush_total: meter
                .u64_counter("waymark_batch_flush_total")
                .with_description("Batch commits by kind and status")
                .with_unit("1")
                .init(),
            flush_rows: meter
                .u64_histogram("waymark_batch_flush_rows")
                .with_description("Rows written per batch commit")
                .with_unit("1")
                .init(),
            flush_latency: meter
                .f64_histogram("waymark_batch_flush_latency_seconds")
                .with_description("Time to execute and commit one batch")
                .with_unit("s")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    install_manual_provider();
                }
            }
        } else {
            // Recorded but not exported
            install_manual_provider();
        }

        let meter = global::meter("waymark");
        Metrics::new(&meter)
    });
}

fn install_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Record the outcome of one track call. No-op before init.
pub fn record_track(namespace: &str, outcome: TrackOutcome) {
    #[cfg(test)]
    RECORDED_OUTCOMES.with(|seen| seen.borrow_mut().push(outcome));

    if let Some(m) = METRICS.get() {
        let attrs = [
            KeyValue::new("namespace", namespace.to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        m.track_total.add(1, &attrs);
    }
}

#[cfg(test)]
thread_local! {
    static RECORDED_OUTCOMES: std::cell::RefCell<Vec<TrackOutcome>> =
        const { std::cell::RefCell::new(Vec::new()) };
}

/// Outcomes passed to [`record_track`] on this thread since the last call.
#[cfg(test)]
pub(crate) fn take_recorded_outcomes() -> Vec<TrackOutcome> {
    RECORDED_OUTCOMES.with(|seen| std::mem::take(&mut *seen.borrow_mut()))
}

/// Record one batch commit attempt. No-op before init.
pub fn record_flush(kind: BatchKind, rows: usize, latency_seconds: f64, ok: bool) {
    if let Some(m) = METRICS.get() {
        let attrs = [
            KeyValue::new("kind", kind.as_str()),
            KeyValue::new("status", if ok { "ok" } else { "error" }),
        ];
        m.flush_total.add(1, &attrs);
        if ok {
            m.flush_rows.record(rows as u64, &attrs[..1]);
            m.flush_latency.record(latency_seconds, &attrs[..1]);
        }
    }
}
