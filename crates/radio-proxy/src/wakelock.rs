//! Wakelock Governor - reference-counted power guards with a safety valve.
//!
//! Each guard ("request" and "ack") keeps a logical count of outstanding
//! units separate from whether the OS-level guard is held: the guard is
//! taken on the 0 → 1 transition and dropped on the 1 → 0 transition, so any
//! number of concurrent requests share one OS acquisition.
//!
//! # Safety Valve
//!
//! ```text
//! acquire ──► count += 1, sequence += 1 ──► schedule expire(sequence)
//!                                                   │
//!                     expire fires ◄────────────────┘
//!                          │
//!        sequence still current? ── no ──► ignore (superseded)
//!                          │ yes
//!                          ▼
//!        count = 0, generation += 1, OS guard released, ledger logged
//! ```
//!
//! Every unit is issued as a [`WakelockTicket`] stamped with the guard's
//! generation. Tickets from before a force-clear are ignored on release.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::domain::{PendingSnapshot, WakelockKind, WakelockTicket, WorkSource};
use crate::metrics::MetricsRecorder;
use crate::ports::{PowerGuard, Scheduler};

/// Produces the ledger snapshot logged when the safety valve fires.
pub type DiagnosticsHook = Box<dyn Fn() -> Vec<PendingSnapshot> + Send + Sync>;

#[derive(Debug, Default)]
struct GuardState {
    count: usize,
    sequence: u64,
    generation: u64,
    attributed: HashMap<WorkSource, usize>,
    held_since: Option<Instant>,
    held_total: Duration,
    expirations: u64,
}

impl GuardState {
    fn sources(&self) -> Vec<WorkSource> {
        let mut sources: Vec<WorkSource> = self.attributed.keys().cloned().collect();
        sources.sort();
        sources
    }

    fn held_total(&self) -> Duration {
        self.held_total + self.held_since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}

/// Point-in-time view of one guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakelockSnapshot {
    pub kind: WakelockKind,
    pub count: usize,
    pub sequence: u64,
    pub generation: u64,
    pub held: bool,
    /// Work sources with the number of outstanding units each holds.
    pub sources: Vec<(WorkSource, usize)>,
    /// Total time the OS-level guard has been held, including now.
    pub held_total: Duration,
    /// Safety-valve force-clears with units outstanding.
    pub expirations: u64,
}

/// Reference-counted "request" and "ack" guards.
pub struct WakelockGovernor {
    request: Mutex<GuardState>,
    ack: Mutex<GuardState>,
    request_timeout: Duration,
    ack_timeout: Duration,
    power: Arc<dyn PowerGuard>,
    scheduler: Arc<dyn Scheduler>,
    metrics: Arc<dyn MetricsRecorder>,
    diagnostics: RwLock<Option<DiagnosticsHook>>,
    weak_self: Weak<WakelockGovernor>,
}

impl WakelockGovernor {
    pub fn new(
        power: Arc<dyn PowerGuard>,
        scheduler: Arc<dyn Scheduler>,
        metrics: Arc<dyn MetricsRecorder>,
        request_timeout: Duration,
        ack_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            request: Mutex::new(GuardState::default()),
            ack: Mutex::new(GuardState::default()),
            request_timeout,
            ack_timeout,
            power,
            scheduler,
            metrics,
            diagnostics: RwLock::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Install the snapshot source logged by the safety valve.
    pub fn set_diagnostics(&self, hook: DiagnosticsHook) {
        *self.diagnostics.write() = Some(hook);
    }

    fn guard(&self, kind: WakelockKind) -> Option<(&Mutex<GuardState>, Duration)> {
        match kind {
            WakelockKind::Request => Some((&self.request, self.request_timeout)),
            WakelockKind::Ack => Some((&self.ack, self.ack_timeout)),
            WakelockKind::None => None,
        }
    }

    /// Add one unit to `kind` on behalf of `work_source`.
    ///
    /// Returns `None` for [`WakelockKind::None`].
    pub fn acquire(&self, kind: WakelockKind, work_source: &WorkSource) -> Option<WakelockTicket> {
        let (lock, timeout) = self.guard(kind)?;

        let mut state = lock.lock();
        if state.count == 0 {
            self.power.acquire(kind);
            state.held_since = Some(Instant::now());
        }
        state.count += 1;

        let refs = state.attributed.entry(work_source.clone()).or_insert(0);
        *refs += 1;
        if *refs == 1 {
            let sources = state.sources();
            self.power.set_attribution(kind, &sources);
        }

        state.sequence += 1;
        let sequence = state.sequence;
        let ticket = WakelockTicket {
            kind,
            generation: state.generation,
            work_source: work_source.clone(),
        };
        trace!(guard = %kind, count = state.count, sequence, "Wakelock acquired");
        drop(state);

        let governor = self.weak_self.clone();
        self.scheduler.schedule(
            timeout,
            Box::new(move || {
                if let Some(governor) = governor.upgrade() {
                    governor.expire(kind, sequence);
                }
            }),
        );

        Some(ticket)
    }

    /// Remove the unit described by `ticket`.
    ///
    /// Returns false for a ticket the safety valve already cleared, or when
    /// the count is already zero; the count never underflows.
    pub fn release(&self, ticket: &WakelockTicket) -> bool {
        let Some((lock, _)) = self.guard(ticket.kind) else {
            return false;
        };
        let kind = ticket.kind;

        let mut state = lock.lock();
        if ticket.generation != state.generation {
            debug!(
                guard = %kind,
                ticket_generation = ticket.generation,
                generation = state.generation,
                "Ignoring release of unit cleared by timeout"
            );
            return false;
        }
        if state.count == 0 {
            warn!(guard = %kind, "Wakelock release with zero count");
            return false;
        }
        state.count -= 1;

        if let Some(refs) = state.attributed.get_mut(&ticket.work_source) {
            *refs -= 1;
            if *refs == 0 {
                state.attributed.remove(&ticket.work_source);
                if state.count > 0 {
                    let sources = state.sources();
                    self.power.set_attribution(kind, &sources);
                }
            }
        }

        if state.count == 0 {
            self.release_guard(kind, &mut state);
        }
        trace!(guard = %kind, count = state.count, "Wakelock released");
        true
    }

    /// Safety-valve callback scheduled by [`acquire`](Self::acquire).
    ///
    /// No-op unless `sequence` is still the guard's latest acquisition.
    pub fn expire(&self, kind: WakelockKind, sequence: u64) {
        let Some((lock, timeout)) = self.guard(kind) else {
            return;
        };

        let mut state = lock.lock();
        if state.sequence != sequence {
            trace!(guard = %kind, sequence, current = state.sequence, "Stale wakelock timeout");
            return;
        }
        if state.count == 0 {
            return;
        }

        let cleared = state.count;
        state.count = 0;
        state.generation += 1;
        state.expirations += 1;
        self.release_guard(kind, &mut state);
        drop(state);

        if kind == WakelockKind::Ack {
            trace!(cleared, "Ack wakelock timed out");
            return;
        }

        self.metrics.record_wakelock_timeout(kind);
        let pending = self
            .diagnostics
            .read()
            .as_ref()
            .map(|hook| hook())
            .unwrap_or_default();
        warn!(
            guard = %kind,
            cleared,
            timeout_ms = timeout.as_millis() as u64,
            pending = pending.len(),
            "Wakelock timed out, force-released"
        );
        for request in &pending {
            warn!(
                serial = %request.serial,
                kind = %request.kind,
                state = %request.state,
                age_ms = request.age.as_millis() as u64,
                work_source = %request.work_source,
                "Pending at wakelock timeout"
            );
        }
    }

    fn release_guard(&self, kind: WakelockKind, state: &mut GuardState) {
        state.attributed.clear();
        if let Some(since) = state.held_since.take() {
            state.held_total += since.elapsed();
        }
        self.power.set_attribution(kind, &[]);
        self.power.release(kind);
    }

    pub fn count(&self, kind: WakelockKind) -> usize {
        self.guard(kind).map_or(0, |(lock, _)| lock.lock().count)
    }

    pub fn is_held(&self, kind: WakelockKind) -> bool {
        self.count(kind) > 0
    }

    pub fn snapshot(&self, kind: WakelockKind) -> WakelockSnapshot {
        let Some((lock, _)) = self.guard(kind) else {
            return WakelockSnapshot {
                kind,
                count: 0,
                sequence: 0,
                generation: 0,
                held: false,
                sources: Vec::new(),
                held_total: Duration::ZERO,
                expirations: 0,
            };
        };

        let state = lock.lock();
        let mut sources: Vec<(WorkSource, usize)> = state
            .attributed
            .iter()
            .map(|(source, refs)| (source.clone(), *refs))
            .collect();
        sources.sort();
        WakelockSnapshot {
            kind,
            count: state.count,
            sequence: state.sequence,
            generation: state.generation,
            held: state.count > 0,
            sources,
            held_total: state.held_total(),
            expirations: state.expirations,
        }
    }
}
