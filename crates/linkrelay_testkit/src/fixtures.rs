//! Test fixtures and envelope builders.
//!
//! Provides convenience functions for producing change envelopes in the
//! connector's wire format and for common test scenarios.

use chrono::{DateTime, TimeZone, Utc};
use linkrelay_cdc::{format_timestamp, LinkRecord};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// Creation time used by the fixtures.
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// Builds a change envelope one field at a time.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    op: String,
    before: Value,
    after: Value,
    source: Value,
    ts_ms: Value,
    sequence: Option<Value>,
}

impl EnvelopeBuilder {
    /// Starts an envelope with the given operation code and null images.
    pub fn new(op: &str) -> Self {
        Self {
            op: op.to_string(),
            before: Value::Null,
            after: Value::Null,
            source: json!({
                "connector": "postgresql",
                "db": "linkfast",
                "table": "links"
            }),
            ts_ms: json!(1_714_564_800_000i64),
            sequence: None,
        }
    }

    /// Sets the `before` image.
    pub fn before(mut self, image: Value) -> Self {
        self.before = image;
        self
    }

    /// Sets the `after` image.
    pub fn after(mut self, image: Value) -> Self {
        self.after = image;
        self
    }

    /// Sets the `source` block.
    pub fn source(mut self, source: Value) -> Self {
        self.source = source;
        self
    }

    /// Sets the connector timestamp.
    pub fn ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = json!(ts_ms);
        self
    }

    /// Sets the sequence token.
    pub fn sequence(mut self, sequence: Value) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Returns the envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "before": self.before,
            "after": self.after,
            "source": self.source,
            "op": self.op,
            "ts_ms": self.ts_ms,
        });
        if let (Some(sequence), Some(map)) = (&self.sequence, payload.as_object_mut()) {
            map.insert("sequence".into(), sequence.clone());
        }
        json!({ "schema": null, "payload": payload })
    }

    /// Serializes the envelope to message bytes.
    pub fn build(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_value()).expect("envelope serializes")
    }
}

/// A row image for a link created at [`fixture_time`] with no expiry.
pub fn link_image(id: i64, short_code: &str, long_url: &str) -> Value {
    json!({
        "id": id,
        "short_code": short_code,
        "long_url": long_url,
        "created_at": format_timestamp(&fixture_time()),
        "expires_at": null
    })
}

/// The row image the connector would emit for `record`.
pub fn record_image(record: &LinkRecord) -> Value {
    json!({
        "id": record.id,
        "short_code": record.short_code,
        "long_url": record.long_url,
        "created_at": format_timestamp(&record.created_at),
        "expires_at": record.expires_at.as_ref().map(format_timestamp)
    })
}

/// An envelope carrying a link in its `after` image.
pub fn link_envelope(op: &str, id: i64, short_code: &str, long_url: &str) -> Vec<u8> {
    EnvelopeBuilder::new(op)
        .after(link_image(id, short_code, long_url))
        .build()
}

/// A delete envelope for `id`.
pub fn delete_envelope(id: i64) -> Vec<u8> {
    EnvelopeBuilder::new("d").before(json!({ "id": id })).build()
}

/// The envelope the connector would emit for `op` applied to `record`.
pub fn envelope_for(op: &str, record: &LinkRecord) -> Vec<u8> {
    let builder = EnvelopeBuilder::new(op);
    match op {
        "d" => builder.before(record_image(record)),
        "u" => builder
            .before(json!({ "id": record.id }))
            .after(record_image(record)),
        _ => builder.after(record_image(record)),
    }
    .build()
}

/// A sample record.
pub fn sample_record(id: i64) -> LinkRecord {
    LinkRecord {
        id,
        short_code: format!("code{id}"),
        long_url: format!("https://example.com/{id}"),
        created_at: fixture_time(),
        expires_at: None,
    }
}

/// A journal location inside a temporary directory.
pub struct TempJournal {
    /// Path of the journal file; the file itself is not created.
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TempJournal {
    /// Creates a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: temp_dir.path().join("links.journal"),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TempJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkrelay_cdc::{decode, Operation};

    #[test]
    fn link_envelope_decodes() {
        let event = decode(&link_envelope("c", 3, "abc", "http://x")).unwrap();
        assert_eq!(event.operation, Operation::Create);
        assert_eq!(event.table(), Some("links"));

        let record = event.link_record().unwrap();
        assert_eq!(record.short_code, "abc");
        assert_eq!(record.created_at, fixture_time());
    }

    #[test]
    fn envelope_for_round_trips_record() {
        let record = LinkRecord {
            expires_at: Some(fixture_time()),
            ..sample_record(9)
        };
        let event = decode(&envelope_for("u", &record)).unwrap();
        assert_eq!(event.link_record().unwrap(), record);

        let event = decode(&envelope_for("d", &record)).unwrap();
        assert_eq!(event.deleted_id().unwrap(), 9);
    }

    #[test]
    fn sequence_is_optional() {
        let raw = EnvelopeBuilder::new("r")
            .after(link_image(1, "a", "b"))
            .sequence(json!(["1", "2"]))
            .build();
        assert!(decode(&raw).unwrap().sequence_token.is_some());
        assert!(decode(&delete_envelope(1)).unwrap().sequence_token.is_none());
    }

    #[test]
    fn temp_journal_is_unique() {
        let a = TempJournal::new();
        let b = TempJournal::new();
        assert_ne!(a.path, b.path);
        assert!(!a.path.exists());
    }
}
