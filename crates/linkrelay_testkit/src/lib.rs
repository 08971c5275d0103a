//! # LinkRelay Testkit
//!
//! Test utilities for LinkRelay.
//!
//! This crate provides:
//! - Change envelope builders and sample records
//! - Temporary journal locations
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkrelay_testkit::prelude::*;
//!
//! #[test]
//! fn create_is_decoded() {
//!     let raw = link_envelope("c", 1, "abc", "http://x");
//!     let event = linkrelay_cdc::decode(&raw).unwrap();
//!     assert_eq!(event.link_record().unwrap().id, 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
