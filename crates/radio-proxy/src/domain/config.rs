//! Proxy configuration with validation.
//!
//! # Config File Format
//!
//! ```toml
//! instance_name = "slot0"
//! wakelock_timeout_ms = 60000
//! ack_wakelock_timeout_ms = 200
//! blocking_response_timeout_ms = 2000
//! reconnect_delay_ms = 4000
//! free_list_capacity = 4
//! blocking_kinds = ["GET_ACTIVITY_INFO", "PULL_LCEDATA"]
//!
//! [default_work_source]
//! uid = 1001
//! package = "com.android.phone"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domain::error::ConfigError;
use crate::domain::types::{RequestKind, WorkSource};

/// Safety-valve bound for the "request" wakelock.
pub const DEFAULT_WAKELOCK_TIMEOUT_MS: u64 = 60_000;

/// Bound for the "ack" wakelock.
pub const DEFAULT_ACK_WAKELOCK_TIMEOUT_MS: u64 = 200;

/// Bound for allow-listed requests before a neutral result is synthesized.
pub const DEFAULT_BLOCKING_RESPONSE_TIMEOUT_MS: u64 = 2_000;

/// Fixed delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 4_000;

/// Spare ledger slots retained after completion.
pub const DEFAULT_FREE_LIST_CAPACITY: usize = 4;

/// Main proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Label used in logs and dumps (e.g. the SIM slot)
    pub instance_name: String,
    /// "request" wakelock safety-valve bound
    pub wakelock_timeout_ms: u64,
    /// "ack" wakelock bound
    pub ack_wakelock_timeout_ms: u64,
    /// Bounded wait for allow-listed request kinds
    pub blocking_response_timeout_ms: u64,
    /// Delay before retrying a failed or lost bind
    pub reconnect_delay_ms: u64,
    /// Spare ledger slots kept for reuse
    pub free_list_capacity: usize,
    /// Request kinds whose callers must not block indefinitely
    pub blocking_kinds: Vec<RequestKind>,
    /// Attribution used when a caller supplies no work source
    pub default_work_source: WorkSource,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            instance_name: "slot0".to_string(),
            wakelock_timeout_ms: DEFAULT_WAKELOCK_TIMEOUT_MS,
            ack_wakelock_timeout_ms: DEFAULT_ACK_WAKELOCK_TIMEOUT_MS,
            blocking_response_timeout_ms: DEFAULT_BLOCKING_RESPONSE_TIMEOUT_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            free_list_capacity: DEFAULT_FREE_LIST_CAPACITY,
            blocking_kinds: vec![RequestKind::GetActivityInfo, RequestKind::PullLceData],
            default_work_source: WorkSource::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("wakelock_timeout_ms", self.wakelock_timeout_ms),
            ("ack_wakelock_timeout_ms", self.ack_wakelock_timeout_ms),
            (
                "blocking_response_timeout_ms",
                self.blocking_response_timeout_ms,
            ),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} cannot be 0", name)));
            }
        }

        if let Some(kind) = self
            .blocking_kinds
            .iter()
            .find(|kind| kind.neutral_default().is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "{} has no neutral default and cannot be allow-listed",
                kind
            )));
        }

        Ok(())
    }

    pub fn wakelock_timeout(&self) -> Duration {
        Duration::from_millis(self.wakelock_timeout_ms)
    }

    pub fn ack_wakelock_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_wakelock_timeout_ms)
    }

    pub fn blocking_response_timeout(&self) -> Duration {
        Duration::from_millis(self.blocking_response_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProxyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wakelock_timeout(), Duration::from_secs(60));
        assert_eq!(config.ack_wakelock_timeout(), Duration::from_millis(200));
        assert_eq!(config.blocking_response_timeout(), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ProxyConfig {
            ack_wakelock_timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ack_wakelock_timeout_ms"));
    }

    #[test]
    fn test_blocking_kind_without_default_rejected() {
        let config = ProxyConfig {
            blocking_kinds: vec![RequestKind::Dial],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ProxyConfig::from_toml_str(
            r#"
            instance_name = "slot1"
            reconnect_delay_ms = 1500
            blocking_kinds = ["GET_ACTIVITY_INFO"]

            [default_work_source]
            uid = 1000
            package = "android"
            "#,
        )
        .unwrap();

        assert_eq!(config.instance_name, "slot1");
        assert_eq!(config.reconnect_delay(), Duration::from_millis(1500));
        assert_eq!(config.blocking_kinds, vec![RequestKind::GetActivityInfo]);
        assert_eq!(config.default_work_source, WorkSource::new(1000, "android"));
        assert_eq!(config.wakelock_timeout_ms, DEFAULT_WAKELOCK_TIMEOUT_MS);
    }

    #[test]
    fn test_parse_garbage() {
        let err = ProxyConfig::from_toml_str("wakelock_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "free_list_capacity = 8").unwrap();

        let config = ProxyConfig::load(file.path()).unwrap();
        assert_eq!(config.free_list_capacity, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProxyConfig::load("/nonexistent/radio-proxy.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
