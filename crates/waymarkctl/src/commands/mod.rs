//! Subcommand implementations.

pub mod records;
pub mod stats;
