//! Structured logging.
//!
//! Installs a global `tracing-subscriber` registry filtered by
//! [`TelemetryConfig::log_level`]. Output is human-readable by default and
//! one JSON object per line when `json_logs` is set, which is what log
//! shippers expect. Every line carries the `tracing` key/value fields the
//! engine attaches (`serial`, `kind`, `epoch`, `guard`, ...).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle returned once logging is installed.
#[derive(Debug)]
pub struct LoggingGuard {
    service: String,
    installed: bool,
}

impl LoggingGuard {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// False when console output was disabled and no subscriber was installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Build the level filter for `config`.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log level {:?}: {}", config.log_level, e)))
}

/// Install the global subscriber.
///
/// Fails with [`TelemetryError::LoggingInit`] if a global subscriber is
/// already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let filter = env_filter(config)?;
    let service = config.full_service_name();

    if !config.console_output {
        return Ok(LoggingGuard {
            service,
            installed: false,
        });
    }

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %service,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        service,
        installed: true,
    })
}
