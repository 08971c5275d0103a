//! # LinkRelay CDC
//!
//! Change envelope types and decoder for the LinkRelay relay.
//!
//! This crate provides:
//! - `ChangeEvent`, the decoded unit of work carried by the change log
//! - `Operation` for the envelope's operation codes
//! - `LinkRecord`, the strictly-typed record mirrored into the read store
//! - Field extraction with explicit type and null checks
//!
//! This is a pure decoding crate with no I/O operations.
//!
//! ## Wire format
//!
//! Each message is a JSON envelope shaped like:
//!
//! ```json
//! {
//!   "payload": {
//!     "before": null,
//!     "after": {
//!       "id": 42,
//!       "short_code": "abc123",
//!       "long_url": "https://example.com",
//!       "created_at": "2024-05-01T12:00:00Z",
//!       "expires_at": null
//!     },
//!     "source": { "connector": "postgresql", "db": "linkfast", "table": "links" },
//!     "op": "c",
//!     "ts_ms": 1714564800000
//!   }
//! }
//! ```
//!
//! Decoding is two-staged: [`decode`] validates the envelope itself, and the
//! row images are converted into typed values only through
//! [`ChangeEvent::link_record`] and [`ChangeEvent::deleted_id`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod fields;
mod operation;
mod record;

pub use envelope::{decode, ChangeEvent, RowImage, SourceInfo};
pub use error::{DecodeError, DecodeResult, JsonKind};
pub use fields::{
    format_timestamp, parse_id, parse_optional_timestamp, parse_string, parse_timestamp,
    TIMESTAMP_FORMAT,
};
pub use operation::Operation;
pub use record::LinkRecord;
