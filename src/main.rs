//! Waymark: track first-seen, last-seen and last-changed times per record.
//!
//! # Usage
//!
//! ```bash
//! waymark --db ./data/waymark.db --input events.ndjson --workers 4
//! producer | waymark --db ./data/waymark.db
//! ```
//!
//! Environment variables can also be used:
//! - `WAYMARK_DB`: SQLite database file
//! - `WAYMARK_INPUT`: Event file (stdin when unset)
//! - `WAYMARK_WORKERS`: Number of tracker workers
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use std::fs;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::watch;
use waymark::config::Config;
use waymark::ingest::run_ingest;
use waymark::observability::metrics::init_metrics_with_endpoint;
use waymark::observability::tracing::init_tracing;
use waymark::TrackerFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level, config.log_json);

    // Initialize metrics (with optional OTLP export)
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    // Ensure the database directory exists
    if let Some(parent) = config.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let factory = TrackerFactory::open(&config.db, config.store_config())
        .with_context(|| format!("failed to open {}", config.db.display()))?;

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("Received SIGINT (Ctrl+C), finishing queued events...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, finishing queued events...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_ok() {
                tracing::info!("Received Ctrl+C, finishing queued events...");
            }
        }

        let _ = shutdown_tx.send(true);
    });

    let summary = run_ingest(factory, input, config.ingest_options(), shutdown_rx).await?;
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
