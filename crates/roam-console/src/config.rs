//! Console tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_PROMPT;
use crate::hub::SERVER_LOG_CHANNEL;
use crate::scrollback::{DEFAULT_SCROLLBACK_CAPACITY, MAX_SCROLLBACK_CAPACITY};
use crate::staging::DEFAULT_STAGING_FLUSH_THRESHOLD;
use crate::view::DEFAULT_AUTOSCROLL_THRESHOLD;

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 50;
const MAX_FLUSH_INTERVAL_MS: u64 = 1_000;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_COMPLETION_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("scrollback capacity {0} exceeds the {MAX_SCROLLBACK_CAPACITY} record ceiling")]
    ScrollbackTooLarge(usize),
    #[error("flush interval {0}ms exceeds the {MAX_FLUSH_INTERVAL_MS}ms ceiling")]
    FlushIntervalTooLong(u64),
    #[error("completion timeout {completion_ms}ms is longer than idle timeout {idle_ms}ms")]
    CompletionOutlastsIdle { completion_ms: u64, idle_ms: u64 },
    #[error("log channel must not be empty")]
    EmptyChannel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub scrollback_capacity: usize,
    pub flush_interval_ms: u64,
    pub staging_flush_threshold: usize,
    pub progress_idle_timeout_ms: u64,
    pub progress_completion_timeout_ms: u64,
    pub autoscroll_threshold: u32,
    pub prompt: String,
    pub log_channel: String,
    pub target: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            scrollback_capacity: DEFAULT_SCROLLBACK_CAPACITY,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            staging_flush_threshold: DEFAULT_STAGING_FLUSH_THRESHOLD,
            progress_idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            progress_completion_timeout_ms: DEFAULT_COMPLETION_TIMEOUT_MS,
            autoscroll_threshold: DEFAULT_AUTOSCROLL_THRESHOLD,
            prompt: DEFAULT_PROMPT.to_owned(),
            log_channel: SERVER_LOG_CHANNEL.to_owned(),
            target: String::new(),
        }
    }
}

impl ConsoleConfig {
    /// Replace zero or blank values with their defaults.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.scrollback_capacity == 0 {
            config.scrollback_capacity = DEFAULT_SCROLLBACK_CAPACITY;
        }
        if config.flush_interval_ms == 0 {
            config.flush_interval_ms = DEFAULT_FLUSH_INTERVAL_MS;
        }
        if config.staging_flush_threshold == 0 {
            config.staging_flush_threshold = DEFAULT_STAGING_FLUSH_THRESHOLD;
        }
        if config.progress_idle_timeout_ms == 0 {
            config.progress_idle_timeout_ms = DEFAULT_IDLE_TIMEOUT_MS;
        }
        if config.progress_completion_timeout_ms == 0 {
            config.progress_completion_timeout_ms = DEFAULT_COMPLETION_TIMEOUT_MS;
        }
        if config.log_channel.trim().is_empty() {
            config.log_channel = SERVER_LOG_CHANNEL.to_owned();
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrollback_capacity > MAX_SCROLLBACK_CAPACITY {
            return Err(ConfigError::ScrollbackTooLarge(self.scrollback_capacity));
        }
        if self.flush_interval_ms > MAX_FLUSH_INTERVAL_MS {
            return Err(ConfigError::FlushIntervalTooLong(self.flush_interval_ms));
        }
        if self.progress_completion_timeout_ms > self.progress_idle_timeout_ms {
            return Err(ConfigError::CompletionOutlastsIdle {
                completion_ms: self.progress_completion_timeout_ms,
                idle_ms: self.progress_idle_timeout_ms,
            });
        }
        if self.log_channel.trim().is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn progress_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_idle_timeout_ms)
    }

    pub fn progress_completion_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_completion_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConsoleConfig};
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = ConsoleConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.scrollback_capacity, 1000);
        assert_eq!(config.flush_interval(), Duration::from_millis(50));
        assert_eq!(config.progress_idle_timeout(), Duration::from_secs(3));
        assert_eq!(config.progress_completion_timeout(), Duration::from_secs(2));
        assert_eq!(config.log_channel, "server-log");
    }

    #[test]
    fn normalized_repairs_zero_values() {
        let config = ConsoleConfig {
            scrollback_capacity: 0,
            flush_interval_ms: 0,
            staging_flush_threshold: 0,
            progress_idle_timeout_ms: 0,
            progress_completion_timeout_ms: 0,
            log_channel: "  ".to_owned(),
            ..ConsoleConfig::default()
        }
        .normalized();
        assert_eq!(config, ConsoleConfig::default());
    }

    #[test]
    fn validate_rejects_contradictions() {
        let slow = ConsoleConfig {
            flush_interval_ms: 5_000,
            ..ConsoleConfig::default()
        };
        assert_eq!(slow.validate(), Err(ConfigError::FlushIntervalTooLong(5_000)));

        let huge = ConsoleConfig {
            scrollback_capacity: usize::MAX / 64,
            ..ConsoleConfig::default()
        };
        assert_eq!(
            huge.validate(),
            Err(ConfigError::ScrollbackTooLarge(usize::MAX / 64))
        );
        let ceiling = ConsoleConfig {
            scrollback_capacity: 1_000_000,
            ..ConsoleConfig::default()
        };
        assert_eq!(ceiling.validate(), Ok(()));

        let inverted = ConsoleConfig {
            progress_idle_timeout_ms: 1_000,
            progress_completion_timeout_ms: 2_000,
            ..ConsoleConfig::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::CompletionOutlastsIdle {
                completion_ms: 2_000,
                idle_ms: 1_000,
            })
        );
    }
}
