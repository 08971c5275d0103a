//! Change envelope decoding.

use crate::error::{DecodeError, DecodeResult, JsonKind};
use crate::fields::parse_id;
use crate::operation::Operation;
use crate::record::LinkRecord;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A row image: the column values of one row, keyed by column name.
///
/// Images stay loosely typed until converted through the functions in
/// [`crate::fields`]; nothing downstream of the decoder reads them directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowImage(Map<String, Value>);

impl RowImage {
    /// Wraps a JSON object.
    pub fn new(columns: Map<String, Value>) -> Self {
        Self(columns)
    }

    /// Returns the raw value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns the row's `id` column as a 64-bit integer.
    pub fn id(&self) -> DecodeResult<i64> {
        parse_id(self, "id")
    }

    /// Converts the JSON value carried under `field` into an image.
    ///
    /// `null` means the image is absent; any other non-object is a
    /// [`DecodeError::WrongType`] naming `field`.
    pub fn from_field(value: Value, field: &str) -> DecodeResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(Self(map))),
            other => Err(DecodeError::WrongType {
                field: field.into(),
                expected: "object",
                actual: JsonKind::of(Some(&other)),
            }),
        }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the image has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for RowImage {
    type Error = DecodeError;

    fn try_from(value: Value) -> DecodeResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DecodeError::WrongType {
                field: "image".into(),
                expected: "object",
                actual: JsonKind::of(Some(&other)),
            }),
        }
    }
}

/// Connector metadata describing where a change originated.
///
/// Carried for log context only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceInfo {
    /// Connector kind (e.g. `postgresql`).
    #[serde(default)]
    pub connector: Option<String>,
    /// Source database name.
    #[serde(default)]
    pub db: Option<String>,
    /// Source table name.
    #[serde(default)]
    pub table: Option<String>,
}

/// A decoded change event.
///
/// `Delete` events are described by `before`; every other operation by
/// `after`. Ordering metadata is preserved but not interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Kind of change.
    pub operation: Operation,
    /// Row state before the change (Update/Delete).
    pub before: Option<RowImage>,
    /// Row state after the change (Create/Update/Read).
    pub after: Option<RowImage>,
    /// Originating connector metadata, if present.
    pub source: Option<SourceInfo>,
    /// Time the connector processed the change, in milliseconds since epoch.
    pub timestamp_millis: Option<i64>,
    /// Opaque position token from the source log.
    pub sequence_token: Option<String>,
}

impl ChangeEvent {
    /// Returns the image that is authoritative for this event's operation.
    pub fn authoritative_image(&self) -> Option<&RowImage> {
        match self.operation {
            Operation::Delete => self.before.as_ref(),
            _ => self.after.as_ref(),
        }
    }

    /// Builds the record described by the `after` image.
    pub fn link_record(&self) -> DecodeResult<LinkRecord> {
        let after = self
            .after
            .as_ref()
            .ok_or(DecodeError::MissingImage { image: "after" })?;
        LinkRecord::from_image(after)
    }

    /// Returns the identifier of the row removed by a delete.
    pub fn deleted_id(&self) -> DecodeResult<i64> {
        self.before
            .as_ref()
            .ok_or(DecodeError::MissingImage { image: "before" })?
            .id()
    }

    /// Returns the source table name, if the connector reported one.
    pub fn table(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.table.as_deref())
    }
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    payload: Option<WirePayload>,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(default)]
    before: Value,
    #[serde(default)]
    after: Value,
    #[serde(default)]
    source: Option<SourceInfo>,
    op: String,
    #[serde(default)]
    ts_ms: Option<i64>,
    #[serde(default)]
    sequence: Option<Value>,
}

/// Decodes a raw message into a change event.
///
/// Unknown fields are ignored and unrecognized operation codes decode to
/// [`Operation::Unknown`]. Row images are not validated here; see
/// [`ChangeEvent::link_record`] and [`ChangeEvent::deleted_id`].
///
/// # Errors
///
/// Returns [`DecodeError::Empty`] for an empty message,
/// [`DecodeError::Malformed`] when the bytes are not a valid envelope, and
/// [`DecodeError::WrongType`] when `before` or `after` is neither an object
/// nor `null`.
pub fn decode(raw: &[u8]) -> DecodeResult<ChangeEvent> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let envelope: WireEnvelope = serde_json::from_slice(raw)?;
    let payload = envelope.payload.ok_or(DecodeError::MissingField {
        field: "payload".into(),
        actual: JsonKind::Missing,
    })?;

    Ok(ChangeEvent {
        operation: Operation::from_code(&payload.op),
        before: RowImage::from_field(payload.before, "before")?,
        after: RowImage::from_field(payload.after, "after")?,
        source: payload.source,
        timestamp_millis: payload.ts_ms,
        sequence_token: payload.sequence.and_then(sequence_token),
    })
}

fn sequence_token(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
