//! Kafka broker adapter.

use crate::broker::{BrokerConnection, BrokerConnector, BrokerMessage};
use crate::config::RelayConfig;
use crate::error::{BrokerError, BrokerResult};
use rdkafka::consumer::{BaseConsumer, CommitMode as KafkaCommitMode, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::time::Duration;
use tracing::debug;

/// Connects to Kafka with a synchronous `BaseConsumer`.
#[derive(Debug, Clone, Default)]
pub struct KafkaConnector;

impl KafkaConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }

    /// Builds the librdkafka client configuration for `config`.
    pub fn client_config(config: &RelayConfig) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set(
                "enable.auto.commit",
                if config.commit_mode.is_auto() {
                    "true"
                } else {
                    "false"
                },
            )
            .set(
                "socket.timeout.ms",
                config.socket_timeout.as_millis().to_string(),
            );
        client
    }
}

impl BrokerConnector for KafkaConnector {
    type Connection = KafkaConnection;

    fn connect(&self, config: &RelayConfig) -> BrokerResult<KafkaConnection> {
        let consumer: BaseConsumer = Self::client_config(config)
            .create()
            .map_err(|e| classify(&e))?;
        debug!(brokers = %config.brokers, group_id = %config.group_id, "kafka consumer created");
        Ok(KafkaConnection { consumer })
    }
}

/// A live Kafka consumer.
pub struct KafkaConnection {
    consumer: BaseConsumer,
}

impl BrokerConnection for KafkaConnection {
    fn subscribe(&mut self, topic: &str) -> BrokerResult<()> {
        self.consumer.subscribe(&[topic]).map_err(|e| classify(&e))
    }

    fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerMessage>> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Ok(message)) => Ok(Some(BrokerMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
            Some(Err(e)) if e.rdkafka_error_code() == Some(RDKafkaErrorCode::OperationTimedOut) => {
                Ok(None)
            }
            Some(Err(e)) => Err(classify(&e)),
        }
    }

    fn commit(&mut self, message: &BrokerMessage) -> BrokerResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|e| classify(&e))?;
        self.consumer
            .commit(&tpl, KafkaCommitMode::Async)
            .map_err(|e| classify(&e))
    }

    fn close(self) {
        self.consumer.unsubscribe();
    }
}

/// Maps a client error onto the relay's recovery classes.
fn classify(error: &KafkaError) -> BrokerError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::AllBrokersDown) => BrokerError::all_brokers_down(error.to_string()),
        Some(RDKafkaErrorCode::Fatal) => BrokerError::fatal(error.to_string()),
        _ => BrokerError::transient(error.to_string()),
    }
}
