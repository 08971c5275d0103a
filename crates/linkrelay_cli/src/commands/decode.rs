//! Decode command implementation.

use super::{CommandError, OutputFormat};
use linkrelay_cdc::{decode, format_timestamp, ChangeEvent, LinkRecord, Operation};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Result of decoding one envelope.
#[derive(Debug, Serialize)]
pub struct DecodeReport {
    /// Operation code as carried on the wire.
    pub op: String,
    /// Operation name.
    pub operation: String,
    /// Source table, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Connector timestamp in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_ms: Option<i64>,
    /// Source position token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    /// Record carried by a create, update or snapshot read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<LinkRecord>,
    /// Identifier removed by a delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_id: Option<i64>,
    /// Why the row image could not be converted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
}

impl DecodeReport {
    /// Builds the report for a decoded event.
    pub fn new(event: &ChangeEvent) -> Self {
        let mut report = Self {
            op: event.operation.code().to_string(),
            operation: event.operation.to_string(),
            table: event.table().map(str::to_string),
            ts_ms: event.timestamp_millis,
            sequence: event.sequence_token.clone(),
            record: None,
            deleted_id: None,
            image_error: None,
        };

        match &event.operation {
            Operation::Delete => match event.deleted_id() {
                Ok(id) => report.deleted_id = Some(id),
                Err(e) => report.image_error = Some(e.to_string()),
            },
            Operation::Unknown(_) => {}
            _ => match event.link_record() {
                Ok(record) => report.record = Some(record),
                Err(e) => report.image_error = Some(e.to_string()),
            },
        }
        report
    }
}

/// Runs the decode command.
pub fn run(file: &Path, format: OutputFormat) -> Result<(), CommandError> {
    let raw = fs::read(file).map_err(|e| CommandError::read(file, e))?;
    let event = decode(&raw)?;
    let report = DecodeReport::new(&event);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &DecodeReport) {
    println!("Operation:  {} ({})", report.operation, report.op);
    if let Some(table) = &report.table {
        println!("Table:      {table}");
    }
    if let Some(ts_ms) = report.ts_ms {
        println!("Timestamp:  {ts_ms} ms");
    }
    if let Some(sequence) = &report.sequence {
        println!("Sequence:   {sequence}");
    }
    if let Some(record) = &report.record {
        println!();
        println!("Record:");
        println!("  id:         {}", record.id);
        println!("  short_code: {}", record.short_code);
        println!("  long_url:   {}", record.long_url);
        println!("  created_at: {}", format_timestamp(&record.created_at));
        match &record.expires_at {
            Some(expires_at) => println!("  expires_at: {}", format_timestamp(expires_at)),
            None => println!("  expires_at: never"),
        }
    }
    if let Some(id) = report.deleted_id {
        println!("Deleted id: {id}");
    }
    if let Some(error) = &report.image_error {
        println!("Invalid image: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkrelay_testkit::{delete_envelope, link_envelope, EnvelopeBuilder};
    use serde_json::json;

    #[test]
    fn report_for_create() {
        let event = decode(&link_envelope("c", 1, "abc", "http://x")).unwrap();
        let report = DecodeReport::new(&event);
        assert_eq!(report.op, "c");
        assert_eq!(report.table.as_deref(), Some("links"));
        assert_eq!(report.record.unwrap().short_code, "abc");
        assert!(report.deleted_id.is_none());
    }

    #[test]
    fn report_for_delete_and_bad_image() {
        let report = DecodeReport::new(&decode(&delete_envelope(4)).unwrap());
        assert_eq!(report.deleted_id, Some(4));

        let raw = EnvelopeBuilder::new("u")
            .after(json!({ "id": 1, "short_code": "a" }))
            .build();
        let report = DecodeReport::new(&decode(&raw).unwrap());
        assert!(report.record.is_none());
        assert!(report.image_error.unwrap().contains("long_url"));
    }

    #[test]
    fn decodes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, link_envelope("r", 2, "snap", "http://s")).unwrap();

        run(&path, OutputFormat::Json).unwrap();
        assert!(matches!(
            run(&dir.path().join("missing.json"), OutputFormat::Text),
            Err(CommandError::Read { .. })
        ));
    }
}
