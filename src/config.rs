//! Configuration parsing for the Waymark ingest runner.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::IngestOptions;
use crate::storage::{BatchConfig, StoreConfig};

/// Waymark: track first-seen, last-seen and last-changed times per record.
#[derive(Parser, Debug, Clone)]
#[command(name = "waymark")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// SQLite database file holding the change_tracker table
    #[arg(short, long, env = "WAYMARK_DB", default_value = "./data/waymark.db")]
    pub db: PathBuf,

    /// Newline-delimited JSON events to ingest (stdin when omitted)
    #[arg(short, long, env = "WAYMARK_INPUT")]
    pub input: Option<PathBuf>,

    /// Number of tracker workers, each with its own connection
    #[arg(short, long, env = "WAYMARK_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Rows per committed insert or update batch
    #[arg(long, env = "WAYMARK_BATCH_SIZE", default_value_t = 100)]
    pub batch_size: usize,

    /// Queue length in front of each worker (backpressure control)
    #[arg(long, env = "WAYMARK_CHANNEL_SIZE", default_value_t = 1000)]
    pub channel_size: usize,

    /// How long a worker waits on a locked database, in milliseconds
    #[arg(long, env = "WAYMARK_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "WAYMARK_LOG_JSON")]
    pub log_json: bool,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Storage settings; the pool holds one connection per worker.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            batch: BatchConfig::from_config(self.batch_size),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            pool_size: u32::try_from(self.workers.max(1)).unwrap_or(u32::MAX),
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            workers: self.workers.max(1),
            channel_size: self.channel_size,
        }
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config(db: PathBuf) -> Self {
        Self {
            db,
            input: None,
            workers: 2,
            batch_size: 10,
            channel_size: 16,
            busy_timeout_ms: 1000,
            log_level: "debug".into(),
            log_json: false,
            otel_endpoint: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: PathBuf::from("./data/waymark.db"),
            input: None,
            workers: 4,
            batch_size: 100,
            channel_size: 1000,
            busy_timeout_ms: 5000,
            log_level: "info".into(),
            log_json: false,
            otel_endpoint: None,
        }
    }
}
