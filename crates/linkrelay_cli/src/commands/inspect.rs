//! Inspect command implementation.

use super::{CommandError, OutputFormat};
use linkrelay_cdc::{format_timestamp, LinkRecord};
use linkrelay_engine::{JournalRecordStore, RecordStore};
use std::path::Path;

/// Loads the records to show, optionally narrowed to one short code.
pub fn load(journal: &Path, short_code: Option<&str>) -> Result<Vec<LinkRecord>, CommandError> {
    if !journal.exists() {
        return Err(CommandError::Config(format!(
            "no journal found at {}",
            journal.display()
        )));
    }

    let store = JournalRecordStore::open(journal)?;
    match short_code {
        Some(code) => Ok(store.find_by_short_code(code)?.into_iter().collect()),
        None => Ok(store.records()),
    }
}

/// Runs the inspect command.
pub fn run(
    journal: &Path,
    short_code: Option<&str>,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let records = load(journal, short_code)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print_text_output(journal, &records),
    }
    Ok(())
}

fn print_text_output(journal: &Path, records: &[LinkRecord]) {
    println!("Journal: {}", journal.display());
    println!("Records: {}", records.len());
    if records.is_empty() {
        return;
    }
    println!();
    println!(
        "{:>10}  {:<16}  {:<20}  {:<20}  URL",
        "ID", "SHORT CODE", "CREATED", "EXPIRES"
    );
    for record in records {
        let expires = record
            .expires_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:>10}  {:<16}  {:<20}  {:<20}  {}",
            record.id,
            record.short_code,
            format_timestamp(&record.created_at),
            expires,
            record.long_url
        );
    }
}
