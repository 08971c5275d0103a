//! Envelope operation codes.

use std::fmt;

/// Kind of row-level change carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Row inserted (`c`).
    Create,
    /// Row updated (`u`).
    Update,
    /// Row emitted by an initial snapshot (`r`).
    Read,
    /// Row deleted (`d`).
    Delete,
    /// Any other code. Decoding succeeds; reconciliation ignores it.
    Unknown(String),
}

impl Operation {
    /// Maps a wire code to an operation.
    pub fn from_code(code: &str) -> Self {
        match code {
            "c" => Operation::Create,
            "u" => Operation::Update,
            "r" => Operation::Read,
            "d" => Operation::Delete,
            other => Operation::Unknown(other.to_string()),
        }
    }

    /// Returns the wire code.
    pub fn code(&self) -> &str {
        match self {
            Operation::Create => "c",
            Operation::Update => "u",
            Operation::Read => "r",
            Operation::Delete => "d",
            Operation::Unknown(code) => code,
        }
    }

    /// Returns true if the operation replaces the record with its `after` image.
    pub fn is_upsert(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Read
        )
    }

    /// Returns the image that is authoritative for this operation.
    pub fn authoritative_image(&self) -> &'static str {
        match self {
            Operation::Delete => "before",
            _ => "after",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => f.write_str("create"),
            Operation::Update => f.write_str("update"),
            Operation::Read => f.write_str("snapshot-read"),
            Operation::Delete => f.write_str("delete"),
            Operation::Unknown(code) => write!(f, "unknown({code:?})"),
        }
    }
}
