//! The single path every removed ledger entry takes to its caller.
//!
//! Replies, death drains, bind failures and timeout synthesis all end here:
//! release the entry's wakelock unit if it still holds one, record the
//! outcome, then deliver. Callers must not hold any lock.

use std::sync::Arc;
use tracing::debug;

use crate::domain::{CommandResult, PendingRequest};
use crate::metrics::{MetricsRecorder, Outcome};
use crate::wakelock::WakelockGovernor;

pub struct Completion {
    wakelocks: Arc<WakelockGovernor>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl Completion {
    pub fn new(wakelocks: Arc<WakelockGovernor>, metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self { wakelocks, metrics }
    }

    /// Finish `request` with `result`, classifying the outcome from it.
    pub fn finish(&self, request: PendingRequest, result: CommandResult) -> bool {
        let outcome = Outcome::of(&result);
        self.finish_as(request, result, outcome)
    }

    /// Finish `request` with an explicit outcome label.
    pub fn finish_as(&self, mut request: PendingRequest, result: CommandResult, outcome: Outcome) -> bool {
        if let Some(ticket) = request.wakelock.take() {
            self.wakelocks.release(&ticket);
        }

        let latency = request.age();
        self.metrics.record_completed(request.kind, outcome, latency);

        let serial = request.serial;
        let kind = request.kind;
        let delivered = request.target.deliver(result);
        debug!(
            serial = %serial,
            kind = %kind,
            outcome = %outcome,
            latency_ms = latency.as_millis() as u64,
            delivered,
            "Request completed"
        );
        delivered
    }
}
