//! # Radio Telemetry
//!
//! Observability wiring for the radio proxy.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry, pretty or JSON lines
//! - **Metrics**: Prometheus collectors fed through `radio_proxy::MetricsRecorder`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use radio_telemetry::{init_telemetry, PrometheusRecorder, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! let proxy = RadioProxy::builder(connector)
//!     .metrics_recorder(Arc::new(PrometheusRecorder::new()))
//!     .build()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RIL_SERVICE_NAME` | `radio-proxy` | Service name in logs |
//! | `RIL_INSTANCE` | `slot0` | Radio instance label |
//! | `RIL_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `RIL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `RIL_JSON_LOGS` | `false` | One JSON object per log line |

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging, LoggingGuard};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, PrometheusRecorder, ACKS_RECEIVED, BINDS,
    DRAINED_REQUESTS, ENDPOINT_DEATHS, INDICATIONS, INDICATION_DELIVERIES, LOCAL_ACKS_SENT,
    PROTOCOL_VIOLATIONS, REGISTRY, REQUESTS_COMPLETED, REQUESTS_SUBMITTED, REQUEST_LATENCY,
    WAKELOCK_TIMEOUTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register the Prometheus collectors.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so nothing recorded during startup is lost
    let metrics = register_metrics()?;
    let logging = init_logging(&config)?;

    Ok(TelemetryGuard {
        config,
        logging,
        metrics,
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    config: TelemetryConfig,
    logging: LoggingGuard,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn logging(&self) -> &LoggingGuard {
        &self.logging
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.logging.service(), "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for recording a metric with a value.
#[macro_export]
macro_rules! metric_observe {
    ($metric:expr, $value:expr) => {
        $metric.observe($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).observe($value)
    };
}
