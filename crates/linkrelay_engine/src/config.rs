//! Configuration for the relay.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default consumer group shared by relay instances.
pub const DEFAULT_GROUP_ID: &str = "link_fast_group";

/// How consumed offsets are committed back to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// The broker client commits periodically on its own.
    #[default]
    Auto,
    /// The relay commits each offset once its event has been reconciled.
    AfterApply,
}

impl CommitMode {
    /// Returns true if the broker client should auto-commit.
    pub fn is_auto(&self) -> bool {
        matches!(self, CommitMode::Auto)
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitMode::Auto => f.write_str("auto"),
            CommitMode::AfterApply => f.write_str("after-apply"),
        }
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CommitMode::Auto),
            "after-apply" | "after_apply" | "manual" => Ok(CommitMode::AfterApply),
            other => Err(format!(
                "unknown commit mode {other:?} (expected `auto` or `after-apply`)"
            )),
        }
    }
}

/// Configuration for the relay loop and its broker connection.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Comma-separated broker addresses.
    pub brokers: String,
    /// Topic carrying the change envelopes.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Where to start when the group has no committed offset.
    pub auto_offset_reset: String,
    /// Broker socket timeout.
    pub socket_timeout: Duration,
    /// Upper bound on a single poll.
    pub poll_timeout: Duration,
    /// Fixed delay before reconnecting.
    pub reconnect_delay: Duration,
    /// Offset commit policy.
    pub commit_mode: CommitMode,
}

impl RelayConfig {
    /// Creates a configuration for the given brokers and topic.
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            auto_offset_reset: "earliest".to_string(),
            socket_timeout: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(5),
            commit_mode: CommitMode::Auto,
        }
    }

    /// Sets the consumer group.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Sets the offset reset policy.
    pub fn with_auto_offset_reset(mut self, reset: impl Into<String>) -> Self {
        self.auto_offset_reset = reset.into();
        self
    }

    /// Sets the broker socket timeout.
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Sets the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the commit mode.
    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Checks that the fields a live connection needs are present.
    pub fn validate(&self) -> Result<(), String> {
        if self.brokers.trim().is_empty() {
            return Err("broker list is empty".into());
        }
        if self.topic.trim().is_empty() {
            return Err("topic is empty".into());
        }
        if self.group_id.trim().is_empty() {
            return Err("consumer group is empty".into());
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RelayConfig::new("kafka:9092", "linkfast.public.links");
        assert_eq!(config.group_id, DEFAULT_GROUP_ID);
        assert_eq!(config.auto_offset_reset, "earliest");
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.socket_timeout, Duration::from_secs(3));
        assert_eq!(config.commit_mode, CommitMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let config = RelayConfig::new("a:1,b:2", "links")
            .with_group_id("projector")
            .with_poll_timeout(Duration::from_millis(50))
            .with_reconnect_delay(Duration::ZERO)
            .with_commit_mode(CommitMode::AfterApply);

        assert_eq!(config.group_id, "projector");
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.reconnect_delay, Duration::ZERO);
        assert!(!config.commit_mode.is_auto());
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(RelayConfig::default().validate().is_err());
        assert!(RelayConfig::new("k:9092", " ").validate().is_err());
        assert!(RelayConfig::new("k:9092", "t")
            .with_group_id("")
            .validate()
            .is_err());
    }

    #[test]
    fn commit_mode_parsing() {
        assert_eq!("auto".parse::<CommitMode>().unwrap(), CommitMode::Auto);
        assert_eq!(
            "After-Apply".parse::<CommitMode>().unwrap(),
            CommitMode::AfterApply
        );
        assert!("sometimes".parse::<CommitMode>().is_err());
        assert_eq!(CommitMode::AfterApply.to_string(), "after-apply");
    }
}
