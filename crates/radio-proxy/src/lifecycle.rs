//! Proxy Lifecycle Manager - owns the live handle to the remote endpoint.
//!
//! # Link States
//!
//! ```text
//!            get_handle()            bind ok
//! UNBOUND ─────────────► BINDING ─────────────► BOUND
//!    ▲                      │                     │
//!    │        bind failed   │                     │ death(cookie == epoch)
//!    ├──────────────────────┘                     ▼
//!    │            reconnect timer              DEAD
//!    └────────────────────────────────────────────┘
//! ```
//!
//! The epoch advances on every bind attempt (the new value is the bind's
//! death cookie) and again on every confirmed death. A death notification
//! or timer carrying an older epoch is stale and ignored. At most one
//! reconnection timer is armed at any time.

use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{Epoch, TransportError};
use crate::metrics::MetricsRecorder;
use crate::ports::{RadioConnector, RadioTransport, ResponseSink, Scheduler};

/// State of the link to the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Unbound,
    Binding,
    Bound,
    Dead,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkPhase::Unbound => write!(f, "unbound"),
            LinkPhase::Binding => write!(f, "binding"),
            LinkPhase::Bound => write!(f, "bound"),
            LinkPhase::Dead => write!(f, "dead"),
        }
    }
}

/// Shared read-only view of the live epoch.
#[derive(Clone, Debug, Default)]
pub struct EpochWatch(Arc<AtomicU64>);

impl EpochWatch {
    pub fn get(&self) -> Epoch {
        Epoch(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, epoch: Epoch) {
        self.0.store(epoch.0, Ordering::SeqCst);
    }
}

/// A bound handle together with the epoch it was bound in.
#[derive(Clone)]
pub struct LiveHandle {
    pub transport: Arc<dyn RadioTransport>,
    pub epoch: Epoch,
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveHandle").field("epoch", &self.epoch).finish()
    }
}

struct LinkState {
    phase: LinkPhase,
    handle: Option<Arc<dyn RadioTransport>>,
    retry_armed: bool,
}

pub struct ProxyLifecycle {
    state: Mutex<LinkState>,
    // Serializes bind attempts across threads. Taken before `state`, never
    // after. Reentrant: a connector may report death from inside `connect`,
    // and a drained result callback may resubmit on that same thread.
    bind_lock: ReentrantMutex<()>,
    epoch: EpochWatch,
    connector: Arc<dyn RadioConnector>,
    sink: ResponseSink,
    scheduler: Arc<dyn Scheduler>,
    metrics: Arc<dyn MetricsRecorder>,
    reconnect_delay: Duration,
    weak_self: Weak<ProxyLifecycle>,
}

impl ProxyLifecycle {
    pub fn new(
        connector: Arc<dyn RadioConnector>,
        sink: ResponseSink,
        scheduler: Arc<dyn Scheduler>,
        metrics: Arc<dyn MetricsRecorder>,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(LinkState {
                phase: LinkPhase::Unbound,
                handle: None,
                retry_armed: false,
            }),
            bind_lock: ReentrantMutex::new(()),
            epoch: EpochWatch::default(),
            connector,
            sink,
            scheduler,
            metrics,
            reconnect_delay,
            weak_self: weak_self.clone(),
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch.get()
    }

    pub fn epoch_watch(&self) -> EpochWatch {
        self.epoch.clone()
    }

    pub fn phase(&self) -> LinkPhase {
        self.state.lock().phase
    }

    pub fn retry_armed(&self) -> bool {
        self.state.lock().retry_armed
    }

    /// The cached handle, if bound.
    pub fn current(&self) -> Option<LiveHandle> {
        let state = self.state.lock();
        match (&state.phase, &state.handle) {
            (LinkPhase::Bound, Some(transport)) => Some(LiveHandle {
                transport: transport.clone(),
                epoch: self.epoch.get(),
            }),
            _ => None,
        }
    }

    /// Return the live handle, binding a fresh one if needed.
    ///
    /// On bind failure a reconnection is scheduled and the error returned.
    /// A bind started from inside the connector's own callbacks supersedes
    /// the outer one, which then fails with `Disconnected`.
    pub fn get_handle(&self) -> Result<LiveHandle, TransportError> {
        if let Some(live) = self.current() {
            return Ok(live);
        }

        let _binding = self.bind_lock.lock();
        if let Some(live) = self.current() {
            return Ok(live);
        }

        let cookie = {
            let mut state = self.state.lock();
            state.phase = LinkPhase::Binding;
            state.handle = None;
            let cookie = self.epoch.get().next();
            self.epoch.set(cookie);
            cookie
        };

        debug!(epoch = %cookie, "Binding remote endpoint");
        let bound = self.connector.connect(self.sink.clone(), cookie);

        let outcome = {
            let mut state = self.state.lock();
            let current = self.epoch.get();
            match bound {
                Ok(transport) if current == cookie => {
                    state.phase = LinkPhase::Bound;
                    state.handle = Some(transport.clone());
                    Ok(LiveHandle {
                        transport,
                        epoch: cookie,
                    })
                }
                Ok(_) => {
                    // Died while binding; the death path already took over.
                    Err(TransportError::Disconnected)
                }
                Err(error) => {
                    if current == cookie {
                        state.phase = LinkPhase::Unbound;
                    }
                    Err(error)
                }
            }
        };

        match &outcome {
            Ok(_) => {
                self.metrics.record_bind(true);
                info!(epoch = %cookie, "Remote endpoint bound");
            }
            Err(error) => {
                self.metrics.record_bind(false);
                warn!(epoch = %cookie, error = %error, "Failed to bind remote endpoint");
                self.schedule_reconnect();
            }
        }
        outcome
    }

    /// Confirm the death of the handle bound with `cookie`.
    ///
    /// Returns the new epoch, or `None` if the notification is stale.
    pub fn confirm_death(&self, cookie: Epoch) -> Option<Epoch> {
        let mut state = self.state.lock();
        let current = self.epoch.get();
        if cookie != current {
            debug!(cookie = %cookie, epoch = %current, "Ignoring stale death notification");
            return None;
        }

        let next = current.next();
        self.epoch.set(next);
        state.phase = LinkPhase::Dead;
        state.handle = None;
        drop(state);

        warn!(cookie = %cookie, epoch = %next, "Remote endpoint died");
        Some(next)
    }

    /// Arm the reconnection timer unless one is already armed.
    pub fn schedule_reconnect(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.retry_armed {
                return false;
            }
            state.retry_armed = true;
        }

        debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnect scheduled");
        let lifecycle = self.weak_self.clone();
        self.scheduler.schedule(
            self.reconnect_delay,
            Box::new(move || {
                if let Some(lifecycle) = lifecycle.upgrade() {
                    lifecycle.reconnect();
                }
            }),
        );
        true
    }

    fn reconnect(&self) {
        let phase = {
            let mut state = self.state.lock();
            state.retry_armed = false;
            state.phase
        };
        if phase == LinkPhase::Bound {
            debug!("Reconnect timer fired while bound");
            return;
        }
        // Failure re-arms the timer inside get_handle.
        let _ = self.get_handle();
    }
}
