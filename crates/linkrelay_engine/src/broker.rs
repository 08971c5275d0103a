//! Change-log broker port.
//!
//! The relay never talks to a broker client directly. A [`BrokerConnector`]
//! builds a fresh [`BrokerConnection`] for every connection epoch; dropping
//! or closing the connection ends the epoch.

use crate::config::RelayConfig;
use crate::error::BrokerResult;
use std::time::Duration;

/// One message pulled from the change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Message key, if any.
    pub key: Option<Vec<u8>>,
    /// Message body. `None` marks a tombstone.
    pub payload: Option<Vec<u8>>,
}

impl BrokerMessage {
    /// Returns the payload, or an empty slice for tombstones.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Opens connections to the broker set.
pub trait BrokerConnector: Send {
    /// Connection type produced by this connector.
    type Connection: BrokerConnection;

    /// Opens a connection using `config`.
    fn connect(&self, config: &RelayConfig) -> BrokerResult<Self::Connection>;
}

/// A live consumer connection.
pub trait BrokerConnection: Send {
    /// Subscribes to `topic` as a member of the configured consumer group.
    fn subscribe(&mut self, topic: &str) -> BrokerResult<()>;

    /// Pulls the next message, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the wait elapses with nothing to read.
    fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerMessage>>;

    /// Commits the position just past `message`.
    fn commit(&mut self, message: &BrokerMessage) -> BrokerResult<()>;

    /// Closes the connection.
    fn close(self);
}
