//! Run command implementation.

use super::CommandError;
use clap::{Args, ValueEnum};
use linkrelay_engine::{CommitMode, RelayConfig, DEFAULT_GROUP_ID};
use std::path::PathBuf;
use std::time::Duration;

/// Record store backing the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Keep records in memory only.
    Memory,
    /// Persist records to a journal file.
    Journal,
}

/// Arguments for `linkrelay run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Comma-separated broker addresses
    #[arg(long, env = "KAFKA_BROKERS")]
    pub brokers: String,

    /// Topic carrying the change envelopes
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: String,

    /// Consumer group
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = DEFAULT_GROUP_ID)]
    pub group_id: String,

    /// Start position when the group has no committed offset
    #[arg(long, env = "KAFKA_AUTO_OFFSET_RESET", default_value = "earliest")]
    pub auto_offset_reset: String,

    /// Broker socket timeout in milliseconds
    #[arg(long, env = "KAFKA_SOCKET_TIMEOUT_MS", default_value_t = 3000)]
    pub socket_timeout_ms: u64,

    /// Maximum wait for a single poll in milliseconds
    #[arg(long, env = "RELAY_POLL_TIMEOUT_MS", default_value_t = 1000)]
    pub poll_timeout_ms: u64,

    /// Delay before reconnecting after a broker failure, in milliseconds
    #[arg(long, env = "RELAY_RECONNECT_DELAY_MS", default_value_t = 5000)]
    pub reconnect_delay_ms: u64,

    /// Offset commit policy (auto, after-apply)
    #[arg(long, env = "RELAY_COMMIT_MODE", default_value = "auto")]
    pub commit_mode: CommitMode,

    /// Deadline for each store call in milliseconds
    #[arg(long, env = "RELAY_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: Option<u64>,

    /// Wait before the first connection attempt, in milliseconds
    #[arg(long, env = "RELAY_STARTUP_DELAY_MS", default_value_t = 0)]
    pub startup_delay_ms: u64,

    /// Record store
    #[arg(long, value_enum, env = "RELAY_STORE", default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// Journal file for the journal store
    #[arg(long, env = "RELAY_JOURNAL", default_value = "linkrelay.journal")]
    pub journal: PathBuf,

    /// Fsync the journal after every write
    #[arg(long)]
    pub sync_writes: bool,
}

impl RunArgs {
    /// Builds and validates the relay configuration.
    pub fn config(&self) -> Result<RelayConfig, CommandError> {
        let config = RelayConfig::new(&self.brokers, &self.topic)
            .with_group_id(&self.group_id)
            .with_auto_offset_reset(&self.auto_offset_reset)
            .with_socket_timeout(Duration::from_millis(self.socket_timeout_ms))
            .with_poll_timeout(Duration::from_millis(self.poll_timeout_ms))
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_commit_mode(self.commit_mode);
        config.validate().map_err(CommandError::Config)?;
        Ok(config)
    }

    /// Per-call store deadline, if any.
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    /// Delay before the relay starts.
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Runs the relay until interrupted.
#[cfg(feature = "kafka")]
pub fn run(args: &RunArgs) -> Result<(), CommandError> {
    use linkrelay_engine::{JournalRecordStore, MemoryRecordStore, TimeoutStore};
    use std::sync::Arc;

    let config = args.config()?;
    match (args.store, args.store_timeout()) {
        (StoreKind::Memory, None) => relay::serve(config, Arc::new(MemoryRecordStore::new()), args),
        (StoreKind::Memory, Some(timeout)) => relay::serve(
            config,
            Arc::new(TimeoutStore::new(Arc::new(MemoryRecordStore::new()), timeout)?),
            args,
        ),
        (StoreKind::Journal, timeout) => {
            let journal =
                Arc::new(JournalRecordStore::open(&args.journal)?.with_sync_writes(args.sync_writes));
            match timeout {
                None => relay::serve(config, journal, args),
                Some(timeout) => {
                    relay::serve(config, Arc::new(TimeoutStore::new(journal, timeout)?), args)
                }
            }
        }
    }
}

/// Runs the relay until interrupted.
#[cfg(not(feature = "kafka"))]
pub fn run(args: &RunArgs) -> Result<(), CommandError> {
    args.config()?;
    Err(CommandError::Config(
        "this build has no broker support; rebuild with the `kafka` feature".into(),
    ))
}

#[cfg(feature = "kafka")]
mod relay {
    use super::{CommandError, RunArgs};
    use linkrelay_engine::{CancelToken, KafkaConnector, RecordStore, Relay, RelayConfig};
    use std::sync::Arc;
    use tracing::{info, warn};

    pub(super) fn serve<S: RecordStore + 'static>(
        config: RelayConfig,
        store: Arc<S>,
        args: &RunArgs,
    ) -> Result<(), CommandError> {
        let cancel = CancelToken::new();
        let startup_delay = args.startup_delay();
        let mut relay =
            Relay::new(config, KafkaConnector::new(), store).with_cancel_token(cancel.clone());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CommandError::Runtime(e.to_string()))?;

        let stats = runtime.block_on(async move {
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("interrupt received; stopping relay");
                        signal_token.cancel();
                    }
                    Err(e) => warn!(error = %e, "cannot listen for interrupts"),
                }
            });

            tokio::task::spawn_blocking(move || {
                if !startup_delay.is_zero() {
                    info!(delay_ms = startup_delay.as_millis() as u64, "delaying startup");
                    if cancel.sleep(startup_delay) {
                        return relay.stats();
                    }
                }
                relay.run()
            })
            .await
        });

        let stats = stats.map_err(|e| CommandError::Runtime(e.to_string()))?;
        info!(
            messages = stats.messages_received,
            upserts = stats.upserts,
            deletes = stats.deletes,
            decode_failures = stats.decode_failures,
            store_failures = stats.store_failures,
            reconnects = stats.reconnects,
            "relay finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn builds_config_from_flags() {
        let harness = Harness::try_parse_from([
            "linkrelay",
            "--brokers",
            "kafka:9092",
            "--topic",
            "linkfast.public.links",
            "--poll-timeout-ms",
            "250",
            "--commit-mode",
            "after-apply",
            "--store",
            "journal",
            "--store-timeout-ms",
            "1500",
        ])
        .unwrap();

        let config = harness.run.config().unwrap();
        assert_eq!(config.brokers, "kafka:9092");
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.commit_mode, CommitMode::AfterApply);
        assert_eq!(harness.run.store, StoreKind::Journal);
        assert_eq!(
            harness.run.store_timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn rejects_blank_topic() {
        let harness =
            Harness::try_parse_from(["linkrelay", "--brokers", "kafka:9092", "--topic", " "])
                .unwrap();
        assert!(matches!(
            harness.run.config(),
            Err(CommandError::Config(_))
        ));
    }
}
