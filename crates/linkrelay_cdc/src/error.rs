//! Error types for envelope decoding.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// The JSON type actually found where a field was expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    /// The key was not present.
    Missing,
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool,
    /// JSON number.
    Number,
    /// JSON string.
    String,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl JsonKind {
    /// Classifies an optional JSON value.
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => JsonKind::Missing,
            Some(Value::Null) => JsonKind::Null,
            Some(Value::Bool(_)) => JsonKind::Bool,
            Some(Value::Number(_)) => JsonKind::Number,
            Some(Value::String(_)) => JsonKind::String,
            Some(Value::Array(_)) => JsonKind::Array,
            Some(Value::Object(_)) => JsonKind::Object,
        }
    }

    /// Returns true for `Missing` and `Null`.
    pub fn is_absent(&self) -> bool {
        matches!(self, JsonKind::Missing | JsonKind::Null)
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonKind::Missing => "missing",
            JsonKind::Null => "null",
            JsonKind::Bool => "bool",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while decoding a change envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The message carried no bytes (a log tombstone).
    #[error("empty message payload")]
    Empty,

    /// The bytes are not a well-formed envelope.
    #[error("malformed envelope: {message}")]
    Malformed {
        /// Parser error description.
        message: String,
    },

    /// The row image required by the operation is absent.
    #[error("row image `{image}` is absent")]
    MissingImage {
        /// `before` or `after`.
        image: &'static str,
    },

    /// A required field is missing or null.
    #[error("field `{field}` is required but was {actual}")]
    MissingField {
        /// Field name.
        field: String,
        /// What was found instead.
        actual: JsonKind,
    },

    /// A field has the wrong JSON type.
    #[error("field `{field}`: expected {expected}, found {actual}")]
    WrongType {
        /// Field name.
        field: String,
        /// Expected type description.
        expected: &'static str,
        /// What was found instead.
        actual: JsonKind,
    },

    /// A numeric identifier cannot be represented exactly as an `i64`.
    #[error("field `{field}`: {value} is not an exact 64-bit integer")]
    InvalidId {
        /// Field name.
        field: String,
        /// The offending number, as written.
        value: String,
    },

    /// A timestamp string does not match the expected format.
    #[error("field `{field}`: cannot parse timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// Field name.
        field: String,
        /// The offending string.
        value: String,
        /// Parser error description.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a malformed envelope error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Returns the name of the offending field, if the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            DecodeError::MissingField { field, .. }
            | DecodeError::WrongType { field, .. }
            | DecodeError::InvalidId { field, .. }
            | DecodeError::InvalidTimestamp { field, .. } => Some(field),
            DecodeError::MissingImage { image } => Some(image),
            DecodeError::Empty | DecodeError::Malformed { .. } => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
