//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the proxy requires from its host: the transport to the remote
//! endpoint, the OS-level power guard, and a timer source.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Epoch, Payload, RequestKind, Serial, TransportError, WakelockKind, WorkSource};
use crate::ports::inbound::ResponseSink;

/// A live handle to the remote endpoint.
///
/// Both sends are fire-and-forget. An error means the handle is unusable and
/// is treated as the death of the epoch it was bound in.
pub trait RadioTransport: Send + Sync {
    /// Send a command tagged with its serial.
    fn send_command(
        &self,
        serial: Serial,
        kind: RequestKind,
        payload: &Payload,
    ) -> Result<(), TransportError>;

    /// Send the zero-payload local acknowledgment frame.
    fn send_ack(&self) -> Result<(), TransportError>;
}

/// Establishes handles to the remote endpoint.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct BinderConnector { service: String }
///
/// impl RadioConnector for BinderConnector {
///     fn connect(&self, sink: ResponseSink, cookie: Epoch)
///         -> Result<Arc<dyn RadioTransport>, TransportError> {
///         let proxy = lookup(&self.service).ok_or(TransportError::Disconnected)?;
///         proxy.set_response_functions(sink.clone());
///         proxy.link_to_death(move || sink.on_endpoint_died(cookie));
///         Ok(Arc::new(proxy))
///     }
/// }
/// ```
pub trait RadioConnector: Send + Sync {
    /// Bind a fresh handle.
    ///
    /// The implementation installs `sink` as the reply/indication receiver and
    /// reports the handle's death through it tagged with `cookie`.
    fn connect(
        &self,
        sink: ResponseSink,
        cookie: Epoch,
    ) -> Result<Arc<dyn RadioTransport>, TransportError>;
}

/// OS-level guard backing one wakelock kind.
///
/// Calls are made under the governor's per-kind lock and must not call back
/// into the proxy.
pub trait PowerGuard: Send + Sync {
    fn acquire(&self, kind: WakelockKind);

    fn release(&self, kind: WakelockKind);

    /// Replace the set of work sources blamed for the guard.
    fn set_attribution(&self, kind: WakelockKind, sources: &[WorkSource]);
}

/// A one-shot delayed task.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer source.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. Tasks cannot be cancelled; callers
    /// capture a sequence or epoch and ignore stale firings.
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}
