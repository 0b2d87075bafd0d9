//! Blocking-Request Timeout Synthesizer.
//!
//! Callers of a few request kinds block on the result. For those kinds a
//! timer is armed at submission; if it fires while the request is still
//! pending, the request completes with the kind's neutral payload instead of
//! an error. A real reply arriving afterwards finds no entry and is dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::completion::Completion;
use crate::domain::{Epoch, RequestKind, Serial};
use crate::ledger::RequestLedger;
use crate::lifecycle::EpochWatch;
use crate::metrics::Outcome;
use crate::ports::Scheduler;

pub struct BlockingTimeouts {
    allow_list: HashSet<RequestKind>,
    timeout: Duration,
    scheduler: Arc<dyn Scheduler>,
    ledger: Arc<RequestLedger>,
    completion: Arc<Completion>,
    epoch: EpochWatch,
}

impl BlockingTimeouts {
    pub fn new(
        allow_list: impl IntoIterator<Item = RequestKind>,
        timeout: Duration,
        scheduler: Arc<dyn Scheduler>,
        ledger: Arc<RequestLedger>,
        completion: Arc<Completion>,
        epoch: EpochWatch,
    ) -> Self {
        Self {
            allow_list: allow_list
                .into_iter()
                .filter(|kind| kind.neutral_default().is_some())
                .collect(),
            timeout,
            scheduler,
            ledger,
            completion,
            epoch,
        }
    }

    pub fn applies(&self, kind: RequestKind) -> bool {
        self.allow_list.contains(&kind)
    }

    /// Arm the timer for a request submitted in `epoch`.
    ///
    /// Returns false if `kind` is not allow-listed.
    pub fn arm(&self, serial: Serial, kind: RequestKind, epoch: Epoch) -> bool {
        if !self.applies(kind) {
            return false;
        }

        let ledger = self.ledger.clone();
        let completion = self.completion.clone();
        let watch = self.epoch.clone();
        self.scheduler.schedule(
            self.timeout,
            Box::new(move || fire(&ledger, &completion, &watch, serial, kind, epoch)),
        );
        debug!(serial = %serial, kind = %kind, timeout_ms = self.timeout.as_millis() as u64, "Armed blocking timeout");
        true
    }
}

fn fire(
    ledger: &RequestLedger,
    completion: &Completion,
    watch: &EpochWatch,
    serial: Serial,
    kind: RequestKind,
    armed_in: Epoch,
) {
    let current = watch.get();
    if current != armed_in {
        debug!(serial = %serial, armed_epoch = %armed_in, epoch = %current, "Stale blocking timeout");
        return;
    }
    let Some(request) = ledger.complete(serial) else {
        return;
    };
    let payload = request.kind.neutral_default().unwrap_or_default();

    info!(serial = %serial, kind = %kind, "No reply in time, delivering neutral result");
    completion.finish_as(request, Ok(payload), Outcome::TimedOut);
}
