//! Stream consumer loop.

use crate::broker::{BrokerConnection, BrokerConnector, BrokerMessage};
use crate::cancel::CancelToken;
use crate::config::{CommitMode, RelayConfig};
use crate::reconcile::{ApplyOutcome, DropReason, Reconciler};
use crate::store::RecordStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The current state of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// No connection; the next step opens one.
    Disconnected,
    /// Connected; the next step subscribes to the topic.
    Subscribing,
    /// Pulling and applying messages.
    Consuming,
    /// A fatal broker error ended the epoch; the next step tears down.
    Draining,
    /// Cancelled. Terminal.
    Stopped,
}

impl RelayState {
    /// Returns true while a broker connection is held.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            RelayState::Subscribing | RelayState::Consuming | RelayState::Draining
        )
    }
}

/// Counters kept by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Messages pulled from the broker.
    pub messages_received: u64,
    /// Records inserted or replaced.
    pub upserts: u64,
    /// Records removed.
    pub deletes: u64,
    /// Deletes that found nothing to remove.
    pub already_absent: u64,
    /// Tombstones and unknown operations.
    pub skipped: u64,
    /// Envelopes or images that could not be decoded.
    pub decode_failures: u64,
    /// Store calls that failed.
    pub store_failures: u64,
    /// Errors reported by the broker.
    pub broker_errors: u64,
    /// Connections torn down for a retry.
    pub reconnects: u64,
    /// Successful subscriptions.
    pub epochs: u64,
    /// Offset commits that failed.
    pub commit_failures: u64,
}

impl RelayStats {
    fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Upserted(_) => self.upserts += 1,
            ApplyOutcome::Deleted(_) => self.deletes += 1,
            ApplyOutcome::AlreadyAbsent(_) => self.already_absent += 1,
            ApplyOutcome::Dropped(reason) => match reason {
                DropReason::Tombstone | DropReason::UnknownOperation(_) => self.skipped += 1,
                DropReason::Malformed(_) | DropReason::InvalidImage(_) => {
                    self.decode_failures += 1
                }
                DropReason::StoreFailure(_) => self.store_failures += 1,
            },
        }
    }
}

/// Consumes the change log and keeps the store reconciled with it.
///
/// Each call to [`step`](Self::step) performs one state transition:
///
/// ```text
/// Disconnected -> Subscribing    connection opened
/// Subscribing  -> Consuming      subscription accepted
/// Subscribing  -> Disconnected   subscribe failed (after backoff)
/// Disconnected -> Disconnected   connect failed (after backoff)
/// Consuming    -> Consuming      message, empty poll or transient error
/// Consuming    -> Draining       fatal or all-brokers-down error
/// Draining     -> Disconnected   connection closed (after backoff)
/// any          -> Stopped        cancel token fired
/// ```
pub struct Relay<C: BrokerConnector, S: RecordStore> {
    config: RelayConfig,
    connector: C,
    reconciler: Reconciler<S>,
    connection: Option<C::Connection>,
    state: RelayState,
    stats: RelayStats,
    cancel: CancelToken,
}

impl<C: BrokerConnector, S: RecordStore> Relay<C, S> {
    /// Creates a relay in the `Disconnected` state.
    pub fn new(config: RelayConfig, connector: C, store: Arc<S>) -> Self {
        Self {
            config,
            connector,
            reconciler: Reconciler::new(store),
            connection: None,
            state: RelayState::Disconnected,
            stats: RelayStats::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Uses an externally owned cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns a handle that stops the relay from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> RelayStats {
        self.stats.clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Returns the target store.
    pub fn store(&self) -> &Arc<S> {
        self.reconciler.store()
    }

    /// Runs until cancelled, returning the final counters.
    pub fn run(&mut self) -> RelayStats {
        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            commit_mode = %self.config.commit_mode,
            "relay starting"
        );
        while self.step() != RelayState::Stopped {}
        info!(
            messages = self.stats.messages_received,
            epochs = self.stats.epochs,
            "relay stopped"
        );
        self.stats.clone()
    }

    /// Performs one transition and returns the resulting state.
    pub fn step(&mut self) -> RelayState {
        if self.cancel.is_cancelled() {
            self.stop();
            return self.state;
        }

        match self.state {
            RelayState::Disconnected => self.connect(),
            RelayState::Subscribing => self.subscribe(),
            RelayState::Consuming => self.consume(),
            RelayState::Draining => self.drain(),
            RelayState::Stopped => {}
        }
        self.state
    }

    fn connect(&mut self) {
        match self.connector.connect(&self.config) {
            Ok(connection) => {
                debug!(brokers = %self.config.brokers, "connected to broker");
                self.connection = Some(connection);
                self.state = RelayState::Subscribing;
            }
            Err(e) => {
                error!(brokers = %self.config.brokers, error = %e, "failed to connect to broker");
                self.stats.broker_errors += 1;
                self.backoff();
            }
        }
    }

    fn subscribe(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            self.state = RelayState::Disconnected;
            return;
        };

        match connection.subscribe(&self.config.topic) {
            Ok(()) => {
                self.stats.epochs += 1;
                info!(topic = %self.config.topic, epoch = self.stats.epochs, "subscribed");
                self.state = RelayState::Consuming;
            }
            Err(e) => {
                error!(topic = %self.config.topic, error = %e, "failed to subscribe");
                self.stats.broker_errors += 1;
                self.close_connection();
                self.backoff();
            }
        }
    }

    fn consume(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            self.state = RelayState::Disconnected;
            return;
        };

        match connection.poll(self.config.poll_timeout) {
            Ok(Some(message)) => self.handle(message),
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                error!(error = %e, "fatal broker error; reconnecting");
                self.stats.broker_errors += 1;
                self.state = RelayState::Draining;
            }
            Err(e) => {
                warn!(error = %e, "broker error");
                self.stats.broker_errors += 1;
            }
        }
    }

    fn handle(&mut self, message: BrokerMessage) {
        self.stats.messages_received += 1;
        debug!(
            partition = message.partition,
            offset = message.offset,
            bytes = message.payload_bytes().len(),
            "message received"
        );

        let outcome = self.reconciler.apply_raw(message.payload_bytes());
        self.stats.record(&outcome);

        if self.config.commit_mode == CommitMode::AfterApply {
            if let Some(connection) = self.connection.as_mut() {
                if let Err(e) = connection.commit(&message) {
                    warn!(offset = message.offset, error = %e, "offset commit failed");
                    self.stats.commit_failures += 1;
                }
            }
        }
    }

    fn drain(&mut self) {
        self.close_connection();
        self.stats.reconnects += 1;
        warn!(
            delay_ms = self.config.reconnect_delay.as_millis() as u64,
            reconnects = self.stats.reconnects,
            "connection closed; reconnecting"
        );
        self.backoff();
    }

    fn backoff(&mut self) {
        self.state = RelayState::Disconnected;
        // a cancel during the wait is picked up by the next step
        self.cancel.sleep(self.config.reconnect_delay);
    }

    fn close_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn stop(&mut self) {
        if self.state != RelayState::Stopped {
            self.close_connection();
            self.state = RelayState::Stopped;
            info!("relay cancelled");
        }
    }
}

impl<C: BrokerConnector, S: RecordStore> Drop for Relay<C, S> {
    fn drop(&mut self) {
        self.close_connection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use crate::mock::ScriptedConnector;
    use crate::store::MemoryRecordStore;
    use linkrelay_testkit::{delete_envelope, link_envelope};
    use std::time::Duration;

    fn relay(connector: &ScriptedConnector) -> Relay<ScriptedConnector, MemoryRecordStore> {
        let config = RelayConfig::new("k:9092", "links")
            .with_poll_timeout(Duration::from_millis(1))
            .with_reconnect_delay(Duration::ZERO);
        Relay::new(config, connector.clone(), Arc::new(MemoryRecordStore::new()))
    }

    #[test]
    fn connects_then_subscribes() {
        let connector = ScriptedConnector::new("links");
        let mut relay = relay(&connector);

        assert_eq!(relay.state(), RelayState::Disconnected);
        assert_eq!(relay.step(), RelayState::Subscribing);
        assert_eq!(relay.step(), RelayState::Consuming);
        assert!(relay.state().is_connected());
        assert_eq!(connector.subscriptions(), vec!["links"]);
        assert_eq!(relay.stats().epochs, 1);
    }

    #[test]
    fn connect_failure_backs_off_to_disconnected() {
        let connector = ScriptedConnector::new("links");
        connector.fail_next_connect(BrokerError::all_brokers_down("refused"));
        let mut relay = relay(&connector);

        assert_eq!(relay.step(), RelayState::Disconnected);
        assert_eq!(relay.step(), RelayState::Subscribing);
        assert_eq!(relay.stats().broker_errors, 1);
    }

    #[test]
    fn subscribe_failure_closes_connection() {
        let connector = ScriptedConnector::new("links");
        connector.fail_next_subscribe(BrokerError::transient("unknown topic"));
        let mut relay = relay(&connector);

        relay.step();
        assert_eq!(relay.step(), RelayState::Disconnected);
        assert_eq!(connector.closes(), 1);
        relay.step();
        assert_eq!(relay.step(), RelayState::Consuming);
        assert_eq!(connector.connects(), 2);
    }

    #[test]
    fn transient_error_keeps_consuming() {
        let connector = ScriptedConnector::new("links");
        connector.push_error(BrokerError::transient("partition EOF"));
        connector.push_timeout();
        connector.push_payload(link_envelope("c", 1, "a", "http://a"));
        let mut relay = relay(&connector);

        relay.step();
        relay.step();
        for _ in 0..3 {
            assert_eq!(relay.step(), RelayState::Consuming);
        }
        assert_eq!(relay.stats().broker_errors, 1);
        assert_eq!(relay.stats().upserts, 1);
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn fatal_error_drains_and_reconnects() {
        let connector = ScriptedConnector::new("links");
        connector.push_error(BrokerError::fatal("coordinator gone"));
        let mut relay = relay(&connector);

        relay.step();
        relay.step();
        assert_eq!(relay.step(), RelayState::Draining);
        assert_eq!(relay.step(), RelayState::Disconnected);
        assert_eq!(connector.closes(), 1);
        relay.step();
        assert_eq!(relay.step(), RelayState::Consuming);

        let stats = relay.stats();
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.epochs, 2);
    }

    #[test]
    fn stats_track_outcomes() {
        let connector = ScriptedConnector::new("links");
        connector.push_payload(link_envelope("c", 1, "a", "http://a"));
        connector.push_payload(b"garbage".to_vec());
        connector.push_tombstone();
        connector.push_payload(delete_envelope(1));
        connector.push_payload(delete_envelope(1));
        let mut relay = relay(&connector);

        while !connector.is_drained() {
            relay.step();
        }

        let stats = relay.stats();
        assert_eq!(stats.messages_received, 5);
        assert_eq!(stats.upserts, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.already_absent, 1);
        assert!(relay.store().is_empty());
    }

    #[test]
    fn cancel_stops_and_closes() {
        let connector = ScriptedConnector::new("links");
        let mut relay = relay(&connector);
        relay.step();
        relay.step();

        relay.cancel_token().cancel();
        assert_eq!(relay.step(), RelayState::Stopped);
        assert_eq!(relay.step(), RelayState::Stopped);
        assert_eq!(connector.closes(), 1);

        drop(relay);
        assert_eq!(connector.closes(), 1);
    }
}
