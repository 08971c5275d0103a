//! Scripted broker for tests.

use crate::broker::{BrokerConnection, BrokerConnector, BrokerMessage};
use crate::config::RelayConfig;
use crate::error::{BrokerError, BrokerResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
enum Step {
    Message(BrokerMessage),
    Timeout,
    Error(BrokerError),
}

#[derive(Debug, Default)]
struct Script {
    topic: String,
    steps: VecDeque<Step>,
    next_offset: i64,
    connect_failures: VecDeque<BrokerError>,
    subscribe_failures: VecDeque<BrokerError>,
    commit_failures: VecDeque<BrokerError>,
    connects: u64,
    closes: u64,
    subscriptions: Vec<String>,
    committed: Vec<i64>,
}

/// A broker connector that replays a pre-recorded script.
///
/// Every connection made from the same connector (or a clone of it) reads
/// from one shared script, so a script can span reconnects. Once the script
/// is exhausted, polls wait out their timeout and return nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    /// Creates an empty script for `topic`.
    pub fn new(topic: impl Into<String>) -> Self {
        let connector = Self::default();
        connector.script.lock().topic = topic.into();
        connector
    }

    /// Queues a message with the next offset.
    pub fn push_payload(&self, payload: impl Into<Vec<u8>>) -> i64 {
        self.push_body(Some(payload.into()))
    }

    /// Queues a tombstone with the next offset.
    pub fn push_tombstone(&self) -> i64 {
        self.push_body(None)
    }

    /// Queues an explicit message, e.g. a redelivery of an earlier offset.
    pub fn push_message(&self, message: BrokerMessage) {
        self.script.lock().steps.push_back(Step::Message(message));
    }

    /// Queues a poll that times out with nothing to read.
    pub fn push_timeout(&self) {
        self.script.lock().steps.push_back(Step::Timeout);
    }

    /// Queues a broker-reported error.
    pub fn push_error(&self, error: BrokerError) {
        self.script.lock().steps.push_back(Step::Error(error));
    }

    /// Makes the next `connect` fail.
    pub fn fail_next_connect(&self, error: BrokerError) {
        self.script.lock().connect_failures.push_back(error);
    }

    /// Makes the next `subscribe` fail.
    pub fn fail_next_subscribe(&self, error: BrokerError) {
        self.script.lock().subscribe_failures.push_back(error);
    }

    /// Makes the next `commit` fail.
    pub fn fail_next_commit(&self, error: BrokerError) {
        self.script.lock().commit_failures.push_back(error);
    }

    /// Returns true once every queued step has been consumed.
    pub fn is_drained(&self) -> bool {
        self.script.lock().steps.is_empty()
    }

    /// Number of successful connects.
    pub fn connects(&self) -> u64 {
        self.script.lock().connects
    }

    /// Number of closed connections.
    pub fn closes(&self) -> u64 {
        self.script.lock().closes
    }

    /// Topics subscribed to, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.script.lock().subscriptions.clone()
    }

    /// Offsets committed, in order.
    pub fn committed(&self) -> Vec<i64> {
        self.script.lock().committed.clone()
    }

    fn push_body(&self, payload: Option<Vec<u8>>) -> i64 {
        let mut script = self.script.lock();
        let offset = script.next_offset;
        script.next_offset += 1;
        let message = BrokerMessage {
            topic: script.topic.clone(),
            partition: 0,
            offset,
            key: None,
            payload,
        };
        script.steps.push_back(Step::Message(message));
        offset
    }
}

impl BrokerConnector for ScriptedConnector {
    type Connection = ScriptedConnection;

    fn connect(&self, _config: &RelayConfig) -> BrokerResult<ScriptedConnection> {
        let mut script = self.script.lock();
        if let Some(error) = script.connect_failures.pop_front() {
            return Err(error);
        }
        script.connects += 1;
        Ok(ScriptedConnection {
            script: Arc::clone(&self.script),
            subscribed: false,
        })
    }
}

/// A connection handed out by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
    subscribed: bool,
}

impl BrokerConnection for ScriptedConnection {
    fn subscribe(&mut self, topic: &str) -> BrokerResult<()> {
        let mut script = self.script.lock();
        if let Some(error) = script.subscribe_failures.pop_front() {
            return Err(error);
        }
        script.subscriptions.push(topic.to_string());
        self.subscribed = true;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerMessage>> {
        if !self.subscribed {
            return Err(BrokerError::transient("poll before subscribe"));
        }

        let step = self.script.lock().steps.pop_front();
        match step {
            Some(Step::Message(message)) => Ok(Some(message)),
            Some(Step::Timeout) => Ok(None),
            Some(Step::Error(error)) => Err(error),
            None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn commit(&mut self, message: &BrokerMessage) -> BrokerResult<()> {
        let mut script = self.script.lock();
        if let Some(error) = script.commit_failures.pop_front() {
            return Err(error);
        }
        script.committed.push(message.offset);
        Ok(())
    }

    fn close(self) {
        self.script.lock().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_shared_across_connections() {
        let connector = ScriptedConnector::new("links");
        assert_eq!(connector.push_payload(b"a".to_vec()), 0);
        connector.push_error(BrokerError::fatal("gone"));
        assert_eq!(connector.push_tombstone(), 1);

        let config = RelayConfig::new("k:9092", "links");
        let mut first = connector.connect(&config).unwrap();
        first.subscribe("links").unwrap();
        let message = first.poll(Duration::ZERO).unwrap().unwrap();
        assert_eq!(message.payload_bytes(), b"a");
        assert!(first.poll(Duration::ZERO).unwrap_err().is_fatal());
        first.close();

        let mut second = connector.connect(&config).unwrap();
        second.subscribe("links").unwrap();
        let tombstone = second.poll(Duration::ZERO).unwrap().unwrap();
        assert!(tombstone.payload.is_none());
        assert!(connector.is_drained());
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 1);
        assert_eq!(connector.subscriptions(), vec!["links", "links"]);
    }

    #[test]
    fn scripted_failures() {
        let connector = ScriptedConnector::new("links");
        let config = RelayConfig::new("k:9092", "links");

        connector.fail_next_connect(BrokerError::all_brokers_down("no route"));
        assert!(connector.connect(&config).is_err());

        let mut connection = connector.connect(&config).unwrap();
        assert!(connection.poll(Duration::ZERO).is_err());

        connector.fail_next_subscribe(BrokerError::transient("rebalancing"));
        assert!(connection.subscribe("links").is_err());
        connection.subscribe("links").unwrap();
        assert_eq!(connection.poll(Duration::from_millis(1)).unwrap(), None);
    }
}
