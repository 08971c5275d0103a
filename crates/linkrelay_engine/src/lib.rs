//! # LinkRelay Engine
//!
//! Consumer loop and reconciliation engine for LinkRelay.
//!
//! This crate provides:
//! - The relay state machine (disconnected → subscribing → consuming → draining)
//! - Reconciliation of change events into a record store
//! - The record store port, with in-memory, journaled and deadline-bounded stores
//! - The broker port, a scripted broker for tests, and a Kafka adapter
//!   behind the `kafka` feature
//!
//! ## Key Invariants
//!
//! - Upserts are full replaces keyed by record id
//! - Deleting an absent record is a success
//! - Every message is final once handled; nothing is retried in place
//! - A failure in one message never stops the loop
//! - Fatal broker errors rebuild the connection after a fixed delay

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod cancel;
mod config;
mod error;
mod journal;
#[cfg(feature = "kafka")]
mod kafka;
mod mock;
mod reconcile;
mod relay;
mod store;
mod timeout;

pub use broker::{BrokerConnection, BrokerConnector, BrokerMessage};
pub use cancel::CancelToken;
pub use config::{CommitMode, RelayConfig, DEFAULT_GROUP_ID};
pub use error::{BrokerError, BrokerResult, StoreError, StoreResult};
pub use journal::JournalRecordStore;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConnection, KafkaConnector};
pub use mock::{ScriptedConnection, ScriptedConnector};
pub use reconcile::{ApplyOutcome, DropReason, Reconciler};
pub use relay::{Relay, RelayState, RelayStats};
pub use store::{MemoryRecordStore, RecordStore};
pub use timeout::TimeoutStore;
