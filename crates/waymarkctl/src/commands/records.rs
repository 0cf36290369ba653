//! Record listing, inspection and deletion commands.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use waymark::record::{format_timestamp, TrackedRecord};
use waymark::storage::query;

use crate::OutputFormat;

#[derive(Serialize)]
struct RecordsOutput {
    namespace: String,
    since: DateTime<Utc>,
    records: Vec<TrackedRecord>,
    total: usize,
}

fn fmt_opt(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), format_timestamp)
}

fn print_records(output: &RecordsOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if output.records.is_empty() {
                println!("No records found.");
                return Ok(());
            }
            println!(
                "{:<40} {:>20} {:>20} {:>20}",
                "ID", "FIRST SEEN", "LAST CHANGED", "DELETED"
            );
            println!("{}", "-".repeat(103));
            for record in &output.records {
                println!(
                    "{:<40} {:>20} {:>20} {:>20}",
                    record.id,
                    fmt_opt(record.first_seen),
                    fmt_opt(record.last_changed),
                    fmt_opt(record.deleted_at),
                );
            }
            println!();
            println!("Total: {} record(s)", output.total);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
    }
    Ok(())
}

pub fn changes(
    conn: &Connection,
    namespace: &str,
    since: DateTime<Utc>,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let records = query::changed_since(conn, namespace, since, limit)?;
    let output = RecordsOutput {
        namespace: namespace.to_string(),
        since,
        total: records.len(),
        records,
    };
    print_records(&output, format)
}

pub fn deleted(
    conn: &Connection,
    namespace: &str,
    since: DateTime<Utc>,
    format: OutputFormat,
) -> Result<()> {
    let records = query::deleted_since(conn, namespace, since)?;
    let output = RecordsOutput {
        namespace: namespace.to_string(),
        since,
        total: records.len(),
        records,
    };
    print_records(&output, format)
}

pub fn show(conn: &Connection, namespace: &str, id: &str, format: OutputFormat) -> Result<()> {
    let Some(record) = query::get_record(conn, namespace, id)? else {
        bail!("no record {namespace}/{id}");
    };

    match format {
        OutputFormat::Text => {
            println!("Namespace:     {}", record.namespace);
            println!("ID:            {}", record.id);
            println!("First seen:    {}", fmt_opt(record.first_seen));
            println!("Last seen:     {}", fmt_opt(record.last_seen));
            println!("Last changed:  {}", fmt_opt(record.last_changed));
            println!("Deleted:       {}", fmt_opt(record.deleted_at));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

pub fn delete(conn: &Connection, namespace: &str, id: &str, at: DateTime<Utc>) -> Result<()> {
    if !query::mark_deleted(conn, namespace, id, at)? {
        bail!("no record {namespace}/{id}");
    }
    println!("Marked {namespace}/{id} deleted");
    Ok(())
}
