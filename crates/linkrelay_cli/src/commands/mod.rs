//! CLI command implementations.

pub mod decode;
pub mod inspect;
pub mod replay;
pub mod run;

pub use run::RunArgs;

use clap::ValueEnum;
use linkrelay_cdc::DecodeError;
use linkrelay_engine::StoreError;
use thiserror::Error;

/// Output format for command reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Reading an input file failed.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The envelope could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Report serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The relay configuration is incomplete.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The relay or signal runtime failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CommandError {
    fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.display().to_string(),
            source,
        }
    }
}
