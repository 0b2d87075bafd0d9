//! Request Ledger - in-flight requests keyed by serial.
//!
//! The ledger owns every [`PendingRequest`] from admission until it is
//! removed by exactly one of: a solicited reply, a death drain, or a
//! bounded-wait timeout. Removal is atomic under the table lock, so whichever
//! path removes an entry first is the only one that delivers its result.

mod slots;

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

use crate::domain::{
    PendingRequest, PendingSnapshot, RequestKind, RequestState, ResultTarget, Serial,
    WakelockTicket, WorkSource,
};
use slots::SlotTable;

/// Upper bound (exclusive) for a freshly seeded serial.
const SERIAL_SEED_RANGE: i32 = 1 << 24;

/// Monotonic serial counter reseeded with a random start value.
///
/// Wraps from `i32::MAX` to zero so serials stay non-negative.
#[derive(Debug)]
pub struct SerialAllocator {
    next: AtomicI32,
}

impl SerialAllocator {
    pub fn new() -> Self {
        Self::with_seed(random_seed())
    }

    pub fn with_seed(seed: i32) -> Self {
        Self {
            next: AtomicI32::new(seed.max(0)),
        }
    }

    /// Take the next serial.
    pub fn next(&self) -> Serial {
        let previous = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                Some(if value == i32::MAX { 0 } else { value + 1 })
            })
            .unwrap_or_else(|value| value);
        Serial(previous)
    }

    /// Jump to a new random starting point.
    pub fn reseed(&self) -> Serial {
        let seed = random_seed();
        self.next.store(seed, Ordering::SeqCst);
        Serial(seed)
    }

    /// Serial the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> Serial {
        Serial(self.next.load(Ordering::SeqCst))
    }
}

impl Default for SerialAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_seed() -> i32 {
    rand::thread_rng().gen_range(0..SERIAL_SEED_RANGE)
}

/// What an ack-only frame did to its entry.
#[derive(Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ack: the entry moved to `Acked` and handed back its wakelock unit.
    Acked(Option<WakelockTicket>),
    /// Entry was already acked.
    Duplicate,
    /// No pending request carries this serial.
    Unknown,
}

struct LedgerInner {
    table: SlotTable<PendingRequest>,
    index: HashMap<Serial, usize>,
}

/// Table of in-flight requests.
pub struct RequestLedger {
    inner: Mutex<LedgerInner>,
    serials: SerialAllocator,
}

impl RequestLedger {
    /// Create a ledger retaining up to `free_list_capacity` spare slots.
    pub fn new(free_list_capacity: usize) -> Self {
        Self::with_allocator(free_list_capacity, SerialAllocator::new())
    }

    pub fn with_allocator(free_list_capacity: usize, serials: SerialAllocator) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                table: SlotTable::new(free_list_capacity),
                index: HashMap::new(),
            }),
            serials,
        }
    }

    /// Admit a request and assign its serial.
    ///
    /// The wakelock unit must already be acquired so that no completion path
    /// can observe the entry before its unit is counted.
    pub fn admit(
        &self,
        kind: RequestKind,
        target: ResultTarget,
        work_source: WorkSource,
        wakelock: Option<WakelockTicket>,
    ) -> Serial {
        let mut inner = self.inner.lock();

        // Skip serials still held by requests from before a wrap.
        let serial = loop {
            let candidate = self.serials.next();
            if !inner.index.contains_key(&candidate) {
                break candidate;
            }
            trace!(serial = %candidate, "Serial still outstanding, skipping");
        };

        let slot = inner.table.insert(PendingRequest {
            serial,
            kind,
            target,
            work_source,
            wakelock,
            state: RequestState::Sent,
            submitted_at: Instant::now(),
        });
        inner.index.insert(serial, slot);

        debug!(serial = %serial, kind = %kind, pending = inner.table.len(), "Admitted request");
        serial
    }

    /// Remove and return the entry for `serial`.
    ///
    /// Returns `None` for unknown or already-completed serials.
    pub fn complete(&self, serial: Serial) -> Option<PendingRequest> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let slot = inner.index.remove(&serial)?;
        let removed = inner.table.remove(slot)?;

        if let Some((_, to)) = removed.relocated {
            if let Some(moved) = inner.table.get(to) {
                inner.index.insert(moved.serial, to);
            }
        }
        Some(removed.value)
    }

    /// Record an ack-only frame for `serial`.
    pub fn mark_acked(&self, serial: Serial) -> AckOutcome {
        let mut inner = self.inner.lock();
        let Some(&slot) = inner.index.get(&serial) else {
            return AckOutcome::Unknown;
        };
        match inner.table.get_mut(slot) {
            Some(request) if request.state == RequestState::Acked => AckOutcome::Duplicate,
            Some(request) => {
                request.state = RequestState::Acked;
                AckOutcome::Acked(request.wakelock.take())
            }
            None => AckOutcome::Unknown,
        }
    }

    /// Empty the table, returning every entry for failure delivery.
    pub fn drain_all(&self) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock();
        inner.index.clear();
        let mut drained = inner.table.drain();
        drop(inner);

        drained.sort_by_key(|request| request.submitted_at);
        drained
    }

    /// Read-only snapshot of every pending request, oldest first.
    pub fn peek_for_diagnostics(&self) -> Vec<PendingSnapshot> {
        let inner = self.inner.lock();
        let mut snapshot: Vec<PendingSnapshot> = inner
            .table
            .iter()
            .map(|(_, request)| PendingSnapshot::from(request))
            .collect();
        drop(inner);

        snapshot.sort_by(|a, b| b.age.cmp(&a.age).then(a.serial.cmp(&b.serial)));
        snapshot
    }

    pub fn contains(&self, serial: Serial) -> bool {
        let inner = self.inner.lock();
        inner
            .index
            .get(&serial)
            .is_some_and(|&slot| inner.table.get(slot).is_some())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spare slots currently retained for reuse.
    pub fn spare_slots(&self) -> usize {
        self.inner.lock().table.spare()
    }

    /// Reseed the serial counter for a new endpoint epoch.
    pub fn reseed(&self) -> Serial {
        let seed = self.serials.reseed();
        debug!(seed = %seed, "Reseeded serial allocator");
        seed
    }
}
