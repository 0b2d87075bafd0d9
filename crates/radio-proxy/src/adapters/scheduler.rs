//! Timer adapters.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::ports::{ScheduledTask, Scheduler};

/// Timers on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

struct ManualState {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<(Duration, u64), ScheduledTask>,
}

/// Virtual clock for deterministic tests.
///
/// Tasks run on the thread calling [`advance`](Self::advance), in deadline
/// order, with ties broken by scheduling order. No lock is held while a task
/// runs, so tasks may schedule further tasks.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                next_id: 0,
                tasks: BTreeMap::new(),
            }),
        }
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut fired = 0;

        loop {
            let task = {
                let mut state = self.state.lock();
                let due = matches!(state.tasks.first_key_value(), Some((&(at, _), _)) if at <= target);
                if !due {
                    state.now = target;
                    break;
                }
                match state.tasks.pop_first() {
                    Some(((at, _), task)) => {
                        state.now = at;
                        task
                    }
                    None => break,
                }
            };
            task();
            fired += 1;
        }

        fired
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Tasks not yet run.
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        let mut state = self.state.lock();
        let at = state.now + delay;
        let id = state.next_id;
        state.next_id += 1;
        state.tasks.insert((at, id), task);
    }
}
