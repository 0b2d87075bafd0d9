//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Radio instance label (`slot0`, `slot1`, ...)
    pub instance: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "radio-proxy".to_string(),
            instance: "slot0".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RIL_SERVICE_NAME`: Service name (default: radio-proxy)
    /// - `RIL_INSTANCE`: Instance label (default: slot0)
    /// - `RIL_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `RIL_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `RIL_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            service_name: lookup("RIL_SERVICE_NAME").unwrap_or(defaults.service_name),

            instance: lookup("RIL_INSTANCE").unwrap_or(defaults.instance),

            log_level: lookup("RIL_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: lookup("RIL_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            json_logs: lookup("RIL_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Configuration for one radio instance.
    pub fn for_instance(instance: &str) -> Self {
        let mut config = Self::from_env();
        config.instance = instance.to_string();
        config
    }

    /// Service name qualified with the instance label.
    pub fn full_service_name(&self) -> String {
        if self.instance.is_empty() {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.instance)
        }
    }
}
