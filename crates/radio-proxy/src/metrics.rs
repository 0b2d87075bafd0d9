//! Metrics hooks for the proxy.
//!
//! [`Metrics`] keeps in-memory counters that feed `dump()`. External systems
//! (Prometheus in `radio-telemetry`) plug in through [`MetricsRecorder`].
//!
//! ## Usage
//!
//! ```ignore
//! use radio_proxy::metrics::{Metrics, MetricsRecorder, Outcome};
//!
//! let metrics = Metrics::new();
//! metrics.record_submitted(RequestKind::Dial);
//! metrics.record_completed(RequestKind::Dial, Outcome::Success, latency);
//! ```

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{CommandResult, IndicationKind, RadioError, RequestKind, WakelockKind};

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Rejected,
    Unavailable,
    /// Bounded wait expired and the neutral payload was delivered.
    TimedOut,
}

impl Outcome {
    pub fn of(result: &CommandResult) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(RadioError::RemoteUnavailable) => Outcome::Unavailable,
            Err(_) => Outcome::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Rejected => "rejected",
            Outcome::Unavailable => "unavailable",
            Outcome::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency totals for one request kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl LatencyStats {
    fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.total += latency;
        self.max = self.max.max(latency);
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total / count,
            Err(_) => Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64),
        }
    }
}

/// In-memory counters.
#[derive(Default)]
pub struct Metrics {
    pub submitted: AtomicU64,
    pub completed_success: AtomicU64,
    pub completed_rejected: AtomicU64,
    pub completed_unavailable: AtomicU64,
    pub completed_timed_out: AtomicU64,
    pub protocol_violations: AtomicU64,
    pub acks_received: AtomicU64,
    pub local_acks_sent: AtomicU64,
    pub indications_dispatched: AtomicU64,
    pub wakelock_timeouts: AtomicU64,
    pub endpoint_deaths: AtomicU64,
    pub drained_requests: AtomicU64,
    pub binds_succeeded: AtomicU64,
    pub binds_failed: AtomicU64,
    latency: Mutex<BTreeMap<RequestKind, LatencyStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self, _kind: RequestKind) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, kind: RequestKind, outcome: Outcome, latency: Duration) {
        let counter = match outcome {
            Outcome::Success => &self.completed_success,
            Outcome::Rejected => &self.completed_rejected,
            Outcome::Unavailable => &self.completed_unavailable,
            Outcome::TimedOut => &self.completed_timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.latency.lock().entry(kind).or_default().record(latency);
    }

    pub fn record_protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ack_received(&self) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_ack_sent(&self) {
        self.local_acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indication(&self, _kind: IndicationKind, _subscribers: usize) {
        self.indications_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wakelock_timeout(&self, _kind: WakelockKind) {
        self.wakelock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_death(&self, drained: usize) {
        self.endpoint_deaths.fetch_add(1, Ordering::Relaxed);
        self.drained_requests
            .fetch_add(drained as u64, Ordering::Relaxed);
    }

    pub fn record_bind(&self, success: bool) {
        if success {
            self.binds_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.binds_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Requests completed through any path.
    pub fn completed(&self) -> u64 {
        self.completed_success.load(Ordering::Relaxed)
            + self.completed_rejected.load(Ordering::Relaxed)
            + self.completed_unavailable.load(Ordering::Relaxed)
            + self.completed_timed_out.load(Ordering::Relaxed)
    }

    /// Per-kind latency, ordered by kind.
    pub fn latency(&self) -> Vec<(RequestKind, LatencyStats)> {
        self.latency
            .lock()
            .iter()
            .map(|(kind, stats)| (*kind, *stats))
            .collect()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed_success: self.completed_success.load(Ordering::Relaxed),
            completed_rejected: self.completed_rejected.load(Ordering::Relaxed),
            completed_unavailable: self.completed_unavailable.load(Ordering::Relaxed),
            completed_timed_out: self.completed_timed_out.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            local_acks_sent: self.local_acks_sent.load(Ordering::Relaxed),
            indications_dispatched: self.indications_dispatched.load(Ordering::Relaxed),
            wakelock_timeouts: self.wakelock_timeouts.load(Ordering::Relaxed),
            endpoint_deaths: self.endpoint_deaths.load(Ordering::Relaxed),
            drained_requests: self.drained_requests.load(Ordering::Relaxed),
            binds_succeeded: self.binds_succeeded.load(Ordering::Relaxed),
            binds_failed: self.binds_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub completed_success: u64,
    pub completed_rejected: u64,
    pub completed_unavailable: u64,
    pub completed_timed_out: u64,
    pub protocol_violations: u64,
    pub acks_received: u64,
    pub local_acks_sent: u64,
    pub indications_dispatched: u64,
    pub wakelock_timeouts: u64,
    pub endpoint_deaths: u64,
    pub drained_requests: u64,
    pub binds_succeeded: u64,
    pub binds_failed: u64,
}

impl MetricsSnapshot {
    pub fn completed(&self) -> u64 {
        self.completed_success
            + self.completed_rejected
            + self.completed_unavailable
            + self.completed_timed_out
    }
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to integrate with external metrics systems
/// like Prometheus.
pub trait MetricsRecorder: Send + Sync {
    fn record_submitted(&self, kind: RequestKind);

    fn record_completed(&self, kind: RequestKind, outcome: Outcome, latency: Duration);

    fn record_protocol_violation(&self);

    fn record_ack_received(&self);

    fn record_local_ack_sent(&self);

    fn record_indication(&self, kind: IndicationKind, subscribers: usize);

    /// The safety valve force-cleared a guard.
    fn record_wakelock_timeout(&self, kind: WakelockKind);

    fn record_endpoint_death(&self, drained: usize);

    fn record_bind(&self, success: bool);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_submitted(&self, _: RequestKind) {}
    fn record_completed(&self, _: RequestKind, _: Outcome, _: Duration) {}
    fn record_protocol_violation(&self) {}
    fn record_ack_received(&self) {}
    fn record_local_ack_sent(&self) {}
    fn record_indication(&self, _: IndicationKind, _: usize) {}
    fn record_wakelock_timeout(&self, _: WakelockKind) {}
    fn record_endpoint_death(&self, _: usize) {}
    fn record_bind(&self, _: bool) {}
}

impl MetricsRecorder for Metrics {
    fn record_submitted(&self, kind: RequestKind) {
        Metrics::record_submitted(self, kind);
    }

    fn record_completed(&self, kind: RequestKind, outcome: Outcome, latency: Duration) {
        Metrics::record_completed(self, kind, outcome, latency);
    }

    fn record_protocol_violation(&self) {
        Metrics::record_protocol_violation(self);
    }

    fn record_ack_received(&self) {
        Metrics::record_ack_received(self);
    }

    fn record_local_ack_sent(&self) {
        Metrics::record_local_ack_sent(self);
    }

    fn record_indication(&self, kind: IndicationKind, subscribers: usize) {
        Metrics::record_indication(self, kind, subscribers);
    }

    fn record_wakelock_timeout(&self, kind: WakelockKind) {
        Metrics::record_wakelock_timeout(self, kind);
    }

    fn record_endpoint_death(&self, drained: usize) {
        Metrics::record_endpoint_death(self, drained);
    }

    fn record_bind(&self, success: bool) {
        Metrics::record_bind(self, success);
    }
}

/// Records into the proxy's own [`Metrics`] and an external recorder.
pub struct MetricsTee {
    local: Arc<Metrics>,
    external: Arc<dyn MetricsRecorder>,
}

impl MetricsTee {
    pub fn new(local: Arc<Metrics>, external: Arc<dyn MetricsRecorder>) -> Self {
        Self { local, external }
    }

    pub fn local(&self) -> &Arc<Metrics> {
        &self.local
    }
}

impl MetricsRecorder for MetricsTee {
    fn record_submitted(&self, kind: RequestKind) {
        self.local.record_submitted(kind);
        self.external.record_submitted(kind);
    }

    fn record_completed(&self, kind: RequestKind, outcome: Outcome, latency: Duration) {
        self.local.record_completed(kind, outcome, latency);
        self.external.record_completed(kind, outcome, latency);
    }

    fn record_protocol_violation(&self) {
        self.local.record_protocol_violation();
        self.external.record_protocol_violation();
    }

    fn record_ack_received(&self) {
        self.local.record_ack_received();
        self.external.record_ack_received();
    }

    fn record_local_ack_sent(&self) {
        self.local.record_local_ack_sent();
        self.external.record_local_ack_sent();
    }

    fn record_indication(&self, kind: IndicationKind, subscribers: usize) {
        self.local.record_indication(kind, subscribers);
        self.external.record_indication(kind, subscribers);
    }

    fn record_wakelock_timeout(&self, kind: WakelockKind) {
        self.local.record_wakelock_timeout(kind);
        self.external.record_wakelock_timeout(kind);
    }

    fn record_endpoint_death(&self, drained: usize) {
        self.local.record_endpoint_death(drained);
        self.external.record_endpoint_death(drained);
    }

    fn record_bind(&self, success: bool) {
        self.local.record_bind(success);
        self.external.record_bind(success);
    }
}
