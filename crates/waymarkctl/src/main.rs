//! waymarkctl: Command-line queries over the Waymark change_tracker table.
//!
//! Answers "what changed since T" for a namespace, inspects single records,
//! and marks records deleted on behalf of the pipeline that removes them.

mod commands;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line queries over the Waymark change_tracker table.
#[derive(Parser)]
#[command(name = "waymarkctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file holding the change_tracker table
    #[arg(short, long, env = "WAYMARK_DB", default_value = "./data/waymark.db")]
    db: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List live records whose content changed after a point in time
    Changes {
        /// Namespace (core) to query
        namespace: String,
        /// Lower bound, exclusive (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_timestamp)]
        since: DateTime<Utc>,
        /// Maximum number of records to return
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// List records marked deleted after a point in time
    Deleted {
        /// Namespace (core) to query
        namespace: String,
        /// Lower bound, exclusive (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_timestamp)]
        since: DateTime<Utc>,
    },
    /// Show the tracking row of one record
    Show {
        namespace: String,
        id: String,
    },
    /// Mark a record deleted
    Delete {
        namespace: String,
        id: String,
        /// Deletion time (defaults to now)
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },
    /// Per-namespace record totals
    Stats,
}

/// Accept a full RFC 3339 timestamp or a bare date (midnight UTC).
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid timestamp `{value}`: expected RFC 3339 or YYYY-MM-DD"))
}

fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = waymark::storage::schema::open_connection(&cli.db, Duration::from_secs(5))
        .with_context(|| format!("failed to open {}", cli.db.display()))?;

    match cli.command {
        Commands::Changes {
            namespace,
            since,
            limit,
        } => commands::records::changes(&conn, &namespace, since, limit, cli.output)?,
        Commands::Deleted { namespace, since } => {
            commands::records::deleted(&conn, &namespace, since, cli.output)?;
        }
        Commands::Show { namespace, id } => {
            commands::records::show(&conn, &namespace, &id, cli.output)?;
        }
        Commands::Delete { namespace, id, at } => {
            commands::records::delete(&conn, &namespace, &id, at.unwrap_or_else(Utc::now))?;
        }
        Commands::Stats => commands::stats::run(&conn, cli.output)?,
    }

    Ok(())
}
