//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing via tracing-subscriber
//! - OpenTelemetry metrics for track outcomes and batch commits

pub mod metrics;
pub mod tracing;
