//! Error types for the relay engine.

use std::time::Duration;
use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors returned by a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with this identifier exists.
    #[error("record {id} not found")]
    NotFound {
        /// Record identifier.
        id: i64,
    },

    /// The call did not complete before its deadline.
    #[error("store call `{operation}` timed out after {timeout:?}")]
    Timeout {
        /// Store operation name.
        operation: &'static str,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// Journal I/O failure.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The journal contains an unreadable entry.
    #[error("journal corrupt at line {line}: {message}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// Parser error description.
        message: String,
    },

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns true for the benign "record absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors reported by the change-log broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Recoverable within the current connection.
    #[error("broker error: {message}")]
    Transient {
        /// Error message.
        message: String,
    },

    /// The connection is unusable and must be rebuilt.
    #[error("fatal broker error: {message}")]
    Fatal {
        /// Error message.
        message: String,
    },

    /// No broker in the configured set is reachable.
    #[error("all brokers down: {message}")]
    AllBrokersDown {
        /// Error message.
        message: String,
    },
}

impl BrokerError {
    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Creates an all-brokers-down error.
    pub fn all_brokers_down(message: impl Into<String>) -> Self {
        Self::AllBrokersDown {
            message: message.into(),
        }
    }

    /// Returns true if the connection must be torn down and rebuilt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::Fatal { .. } | BrokerError::AllBrokersDown { .. }
        )
    }
}
