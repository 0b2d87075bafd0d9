//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** transport callbacks and the caller API
//! - **Driven Ports (Outbound):** transport, power guard and timers

pub mod inbound;
pub mod outbound;

pub use inbound::{RadioApi, RadioResponseHandler, ResponseSink};
pub use outbound::{PowerGuard, RadioConnector, RadioTransport, ScheduledTask, Scheduler};
