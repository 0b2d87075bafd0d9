//! In-process adapters for the outbound ports.
//!
//! - `scheduler` - tokio and virtual-clock timers
//! - `power` - kernel, no-op and recording power guards
//! - `loopback` - fake remote endpoint for tests and demos

pub mod loopback;
pub mod power;
pub mod scheduler;

pub use loopback::{LoopbackRadio, SentCommand};
pub use power::{NoopPowerGuard, PowerEvent, RecordingPowerGuard, SysfsPowerGuard};
pub use scheduler::{ManualScheduler, TokioScheduler};
