//! Journal configuration
//!
//! Every field has a default so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::circular::MAX_LOG_SIZE;

/// Invalid configuration value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("log_size must be between 1 and {max}, got {got}")]
    LogSize { got: u64, max: u64 },

    #[error("install_threshold must be between 1 and log_size ({log_size}), got {got}")]
    InstallThreshold { got: u64, log_size: u64 },

    #[error("{field} must be > 0")]
    ZeroInterval { field: &'static str },
}

/// Tuning for the log, the logger thread and the installer thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Number of circular log slots written by `format`
    #[serde(default = "default_log_size")]
    pub log_size: u64,

    /// Log occupancy (slots) that wakes the installer early
    #[serde(default = "default_install_threshold")]
    pub install_threshold: u64,

    /// Period of the installer thread
    #[serde(default = "default_install_interval_ms")]
    pub install_interval_ms: u64,

    /// Period of the logger thread; bounds how long a `wait = false`
    /// commit stays non-durable
    #[serde(default = "default_logger_interval_ms")]
    pub logger_interval_ms: u64,

    /// How long a commit waits for log space before failing
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Wake the logger immediately for `wait = false` commits too
    #[serde(default)]
    pub sync_nowait_commits: bool,
}

fn default_log_size() -> u64 {
    MAX_LOG_SIZE
}
fn default_install_threshold() -> u64 {
    MAX_LOG_SIZE / 2
}
fn default_install_interval_ms() -> u64 {
    100
}
fn default_logger_interval_ms() -> u64 {
    10
}
fn default_commit_timeout_ms() -> u64 {
    5000
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            log_size: default_log_size(),
            install_threshold: default_install_threshold(),
            install_interval_ms: default_install_interval_ms(),
            logger_interval_ms: default_logger_interval_ms(),
            commit_timeout_ms: default_commit_timeout_ms(),
            sync_nowait_commits: false,
        }
    }
}

impl JournalConfig {
    /// Config with a smaller log; the install threshold follows it.
    pub fn with_log_size(log_size: u64) -> Self {
        Self {
            log_size,
            install_threshold: (log_size / 2).max(1),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_size == 0 || self.log_size > MAX_LOG_SIZE {
            return Err(ConfigError::LogSize {
                got: self.log_size,
                max: MAX_LOG_SIZE,
            });
        }
        if self.install_threshold == 0 || self.install_threshold > self.log_size {
            return Err(ConfigError::InstallThreshold {
                got: self.install_threshold,
                log_size: self.log_size,
            });
        }
        if self.install_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "install_interval_ms",
            });
        }
        if self.logger_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "logger_interval_ms",
            });
        }
        Ok(())
    }

    pub fn install_interval(&self) -> Duration {
        Duration::from_millis(self.install_interval_ms)
    }

    pub fn logger_interval(&self) -> Duration {
        Duration::from_millis(self.logger_interval_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = JournalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_size, MAX_LOG_SIZE);
        assert!(!config.sync_nowait_commits);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: JournalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JournalConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config: JournalConfig =
            serde_json::from_str(r#"{"log_size": 16, "install_threshold": 4}"#).unwrap();
        assert_eq!(config.log_size, 16);
        assert_eq!(config.install_threshold, 4);
        assert_eq!(config.commit_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_log_size() {
        let config = JournalConfig::with_log_size(8);
        assert_eq!(config.install_threshold, 4);
        assert!(config.validate().is_ok());
        assert_eq!(JournalConfig::with_log_size(1).install_threshold, 1);
    }

    #[test]
    fn test_rejects_oversized_log() {
        let config = JournalConfig::with_log_size(MAX_LOG_SIZE + 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LogSize { .. })
        ));
    }

    #[test]
    fn test_rejects_threshold_above_log() {
        let config = JournalConfig {
            install_threshold: 20,
            ..JournalConfig::with_log_size(8)
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InstallThreshold { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = JournalConfig {
            logger_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval {
                field: "logger_interval_ms"
            })
        );
    }
}
