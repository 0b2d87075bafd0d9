//! In-flight request records and their result targets.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::domain::types::{CommandResult, RequestKind, Serial, WakelockKind, WorkSource};

/// Where a request's single outcome is delivered.
pub enum ResultTarget {
    /// Awaitable oneshot channel.
    Channel(oneshot::Sender<CommandResult>),
    /// Callback invoked on whichever thread completes the request.
    Callback(Box<dyn FnOnce(CommandResult) + Send>),
    /// Fire-and-forget: the outcome is logged and dropped.
    Detached,
}

impl ResultTarget {
    /// Create a channel target and the receiver the caller awaits.
    pub fn channel() -> (Self, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        (ResultTarget::Channel(tx), rx)
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        ResultTarget::Callback(Box::new(f))
    }

    /// Deliver the outcome. Returns false if the caller has gone away.
    ///
    /// Must never be called while holding a ledger or wakelock lock.
    pub fn deliver(self, result: CommandResult) -> bool {
        match self {
            ResultTarget::Channel(tx) => tx.send(result).is_ok(),
            ResultTarget::Callback(f) => {
                f(result);
                true
            }
            ResultTarget::Detached => true,
        }
    }
}

impl fmt::Debug for ResultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultTarget::Channel(_) => f.write_str("ResultTarget::Channel"),
            ResultTarget::Callback(_) => f.write_str("ResultTarget::Callback"),
            ResultTarget::Detached => f.write_str("ResultTarget::Detached"),
        }
    }
}

/// One unit of wakelock accounting, issued by the governor on acquire.
///
/// The generation pins the unit to the guard state it was counted in: a
/// safety-valve force-clear advances the generation and orphans every
/// earlier ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakelockTicket {
    pub kind: WakelockKind,
    pub generation: u64,
    pub work_source: WorkSource,
}

/// Acknowledgment state of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Command handed to the transport, nothing heard back.
    Sent,
    /// Remote acknowledged receipt; payload still outstanding.
    Acked,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Sent => f.write_str("sent"),
            RequestState::Acked => f.write_str("acked"),
        }
    }
}

/// A request owned by the ledger from admission until completion.
#[derive(Debug)]
pub struct PendingRequest {
    pub serial: Serial,
    pub kind: RequestKind,
    pub target: ResultTarget,
    pub work_source: WorkSource,
    /// Outstanding wakelock unit, `None` once released.
    pub wakelock: Option<WakelockTicket>,
    pub state: RequestState,
    pub submitted_at: Instant,
}

impl PendingRequest {
    pub fn wakelock_kind(&self) -> WakelockKind {
        self.wakelock
            .as_ref()
            .map_or(WakelockKind::None, |ticket| ticket.kind)
    }

    pub fn age(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Read-only view of a pending request for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub serial: Serial,
    pub kind: RequestKind,
    pub age: Duration,
    pub state: RequestState,
    pub wakelock: WakelockKind,
    pub work_source: WorkSource,
}

impl From<&PendingRequest> for PendingSnapshot {
    fn from(request: &PendingRequest) -> Self {
        Self {
            serial: request.serial,
            kind: request.kind,
            age: request.age(),
            state: request.state,
            wakelock: request.wakelock_kind(),
            work_source: request.work_source.clone(),
        }
    }
}
