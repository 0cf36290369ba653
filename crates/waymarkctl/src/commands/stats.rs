//! Stats command implementation.

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use waymark::storage::query::{namespace_counts, NamespaceCounts};

use crate::OutputFormat;

#[derive(Serialize)]
struct StatsOutput {
    namespaces: Vec<NamespaceCounts>,
    total_active: i64,
    total_deleted: i64,
}

fn collect(conn: &Connection) -> Result<StatsOutput> {
    let namespaces = namespace_counts(conn)?;
    Ok(StatsOutput {
        total_active: namespaces.iter().map(|n| n.active).sum(),
        total_deleted: namespaces.iter().map(|n| n.deleted).sum(),
        namespaces,
    })
}

pub fn run(conn: &Connection, format: OutputFormat) -> Result<()> {
    let output = collect(conn)?;

    match format {
        OutputFormat::Text => {
            if output.namespaces.is_empty() {
                println!("No records tracked.");
            } else {
                println!("{:<40} {:>12} {:>12}", "NAMESPACE", "ACTIVE", "DELETED");
                println!("{}", "-".repeat(66));
                for ns in &output.namespaces {
                    println!("{:<40} {:>12} {:>12}", ns.namespace, ns.active, ns.deleted);
                }
                println!();
                println!(
                    "Total: {} active, {} deleted",
                    output.total_active, output.total_deleted
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
