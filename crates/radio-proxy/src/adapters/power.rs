//! OS-level power guard adapters.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::{WakelockKind, WorkSource};
use crate::ports::PowerGuard;

/// Guard that does nothing, for hosts without power management.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPowerGuard;

impl PowerGuard for NoopPowerGuard {
    fn acquire(&self, _: WakelockKind) {}
    fn release(&self, _: WakelockKind) {}
    fn set_attribution(&self, _: WakelockKind, _: &[WorkSource]) {}
}

/// Kernel wakelocks through `wake_lock` / `wake_unlock` files.
///
/// Write failures are logged and otherwise ignored: losing the OS guard
/// must never fail a request.
#[derive(Debug, Clone)]
pub struct SysfsPowerGuard {
    root: PathBuf,
    prefix: String,
}

impl SysfsPowerGuard {
    /// Default location of the kernel wakelock interface.
    pub const DEFAULT_ROOT: &'static str = "/sys/power";

    /// Guard writing under `root`, naming locks `<prefix>_<kind>`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn lock_name(&self, kind: WakelockKind) -> String {
        format!("{}_{}", self.prefix, kind.as_str())
    }

    fn write(&self, file: &str, kind: WakelockKind) {
        let path = self.root.join(file);
        let name = self.lock_name(kind);
        if let Err(e) = append(&path, &name) {
            warn!(path = %path.display(), lock = %name, error = %e, "Failed to write wakelock");
        }
    }
}

fn append(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(line.as_bytes())
}

impl PowerGuard for SysfsPowerGuard {
    fn acquire(&self, kind: WakelockKind) {
        self.write("wake_lock", kind);
    }

    fn release(&self, kind: WakelockKind) {
        self.write("wake_unlock", kind);
    }

    fn set_attribution(&self, kind: WakelockKind, sources: &[WorkSource]) {
        // The kernel interface has no notion of attribution.
        debug!(
            lock = %self.lock_name(kind),
            sources = sources.len(),
            "Wakelock attribution updated"
        );
    }
}

/// Power guard call, as seen by [`RecordingPowerGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    Acquire(WakelockKind),
    Release(WakelockKind),
    Attribute(WakelockKind, Vec<WorkSource>),
}

#[derive(Default)]
struct Recorded {
    events: Vec<PowerEvent>,
    held: HashMap<WakelockKind, bool>,
    attribution: HashMap<WakelockKind, Vec<WorkSource>>,
}

/// Guard that records every call.
#[derive(Default)]
pub struct RecordingPowerGuard {
    recorded: Mutex<Recorded>,
}

impl RecordingPowerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PowerEvent> {
        self.recorded.lock().events.clone()
    }

    pub fn is_held(&self, kind: WakelockKind) -> bool {
        self.recorded
            .lock()
            .held
            .get(&kind)
            .copied()
            .unwrap_or(false)
    }

    /// Number of OS-level acquisitions of `kind`.
    pub fn acquisitions(&self, kind: WakelockKind) -> usize {
        self.recorded
            .lock()
            .events
            .iter()
            .filter(|event| **event == PowerEvent::Acquire(kind))
            .count()
    }

    /// Latest attribution set for `kind`.
    pub fn attribution(&self, kind: WakelockKind) -> Vec<WorkSource> {
        self.recorded
            .lock()
            .attribution
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

impl PowerGuard for RecordingPowerGuard {
    fn acquire(&self, kind: WakelockKind) {
        let mut recorded = self.recorded.lock();
        recorded.events.push(PowerEvent::Acquire(kind));
        recorded.held.insert(kind, true);
    }

    fn release(&self, kind: WakelockKind) {
        let mut recorded = self.recorded.lock();
        recorded.events.push(PowerEvent::Release(kind));
        recorded.held.insert(kind, false);
    }

    fn set_attribution(&self, kind: WakelockKind, sources: &[WorkSource]) {
        let mut recorded = self.recorded.lock();
        recorded
            .events
            .push(PowerEvent::Attribute(kind, sources.to_vec()));
        recorded.attribution.insert(kind, sources.to_vec());
    }
}
