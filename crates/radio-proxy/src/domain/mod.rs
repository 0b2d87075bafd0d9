//! Domain types for the radio proxy.
//!
//! This module contains the value types, request records, configuration and
//! error handling. Stateful components live at the crate root.

pub mod config;
pub mod error;
pub mod pending;
pub mod types;

// Re-exports for convenience
pub use config::ProxyConfig;
pub use error::{codes, ConfigError, RadioError, TransportError};
pub use pending::{PendingRequest, PendingSnapshot, RequestState, ResultTarget, WakelockTicket};
pub use types::*;
