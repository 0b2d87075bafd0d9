//! Error types for the radio proxy.
//!
//! Every remote-side anomaly is converted into one of the [`RadioError`]
//! outcomes. Bounded-wait timeouts are not errors: they deliver the kind's
//! neutral payload instead.

use thiserror::Error;

use crate::domain::types::Serial;

/// Radio interface error codes delivered with coded failures.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const RADIO_NOT_AVAILABLE: i32 = 1;
    pub const GENERIC_FAILURE: i32 = 2;
    pub const REQUEST_NOT_SUPPORTED: i32 = 6;
    pub const INTERNAL_ERR: i32 = 38;
}

/// Outcomes a caller (or the log) can observe for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// Handle could not be obtained, or the endpoint was confirmed dead.
    #[error("Remote endpoint unavailable")]
    RemoteUnavailable,

    /// Solicited reply carried a nonzero error code.
    #[error("Remote endpoint rejected request with code {code}")]
    RemoteRejected { code: i32 },

    /// Reply referenced a serial with no pending request.
    #[error("Protocol violation: no pending request for serial {serial}")]
    ProtocolViolation { serial: Serial },
}

impl RadioError {
    /// Numeric code delivered alongside the failure.
    pub fn code(&self) -> i32 {
        match self {
            RadioError::RemoteUnavailable => codes::RADIO_NOT_AVAILABLE,
            RadioError::RemoteRejected { code } => *code,
            RadioError::ProtocolViolation { .. } => codes::INTERNAL_ERR,
        }
    }

    /// Map a remote error code to a result error, `None` for success.
    ///
    /// A coded reply came from a live endpoint, so even
    /// `RADIO_NOT_AVAILABLE` is a rejection, never `RemoteUnavailable`.
    pub fn from_remote_code(code: i32) -> Option<Self> {
        match code {
            codes::SUCCESS => None,
            code => Some(RadioError::RemoteRejected { code }),
        }
    }
}

/// Errors raised by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Remote endpoint disconnected")]
    Disconnected,

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl From<TransportError> for RadioError {
    fn from(_: TransportError) -> Self {
        RadioError::RemoteUnavailable
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
