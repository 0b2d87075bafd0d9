//! Prometheus metrics for the radio proxy.
//!
//! All metrics follow the naming convention: `ril_<component>_<metric>_<unit>`
//!
//! [`PrometheusRecorder`] plugs these collectors into the engine through
//! `radio_proxy::MetricsRecorder`; [`encode_metrics`] renders the text
//! exposition format for a scrape endpoint.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use radio_proxy::{IndicationKind, MetricsRecorder, Outcome, RequestKind, WakelockKind};

use crate::TelemetryError;

/// Request latency buckets in seconds, 1ms to ~16s.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0,
];

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REQUEST METRICS
    // =========================================================================

    /// Requests admitted to the ledger
    pub static ref REQUESTS_SUBMITTED: CounterVec = CounterVec::new(
        Opts::new("ril_requests_submitted_total", "Requests submitted to the radio"),
        &["kind"]
    ).expect("metric creation failed");

    /// Requests completed, by outcome
    pub static ref REQUESTS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("ril_requests_completed_total", "Requests completed"),
        &["kind", "outcome"]  // outcome: success/rejected/unavailable/timed_out
    ).expect("metric creation failed");

    /// Submission to completion
    pub static ref REQUEST_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ril_request_latency_seconds",
            "Time from submission to completion"
        ).buckets(LATENCY_BUCKETS.to_vec()),
        &["kind"]
    ).expect("metric creation failed");

    /// Replies or acks the ledger could not correlate
    pub static ref PROTOCOL_VIOLATIONS: Counter = Counter::new(
        "ril_protocol_violations_total",
        "Replies or acks referring to unknown serials"
    ).expect("metric creation failed");

    // =========================================================================
    // ACKNOWLEDGMENT METRICS
    // =========================================================================

    pub static ref ACKS_RECEIVED: Counter = Counter::new(
        "ril_acks_received_total",
        "Early acknowledgments received from the radio"
    ).expect("metric creation failed");

    pub static ref LOCAL_ACKS_SENT: Counter = Counter::new(
        "ril_local_acks_sent_total",
        "Acknowledgments sent back to the radio"
    ).expect("metric creation failed");

    // =========================================================================
    // INDICATION METRICS
    // =========================================================================

    pub static ref INDICATIONS: CounterVec = CounterVec::new(
        Opts::new("ril_indications_total", "Unsolicited indications received"),
        &["kind"]
    ).expect("metric creation failed");

    /// Indications handed to subscribers (one per live receiver)
    pub static ref INDICATION_DELIVERIES: CounterVec = CounterVec::new(
        Opts::new("ril_indication_deliveries_total", "Indications delivered to subscribers"),
        &["kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // WAKELOCK METRICS
    // =========================================================================

    /// Safety-valve expirations
    pub static ref WAKELOCK_TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("ril_wakelock_timeouts_total", "Wakelocks force-released by their timeout"),
        &["guard"]  // guard: request/ack
    ).expect("metric creation failed");

    // =========================================================================
    // LINK METRICS
    // =========================================================================

    pub static ref ENDPOINT_DEATHS: Counter = Counter::new(
        "ril_endpoint_deaths_total",
        "Confirmed deaths of the radio endpoint"
    ).expect("metric creation failed");

    /// Requests failed because the endpoint died under them
    pub static ref DRAINED_REQUESTS: Counter = Counter::new(
        "ril_drained_requests_total",
        "Requests failed by an endpoint death"
    ).expect("metric creation failed");

    pub static ref BINDS: CounterVec = CounterVec::new(
        Opts::new("ril_bind_attempts_total", "Attempts to bind the radio endpoint"),
        &["result"]  // result: success/failed
    ).expect("metric creation failed");
}

/// Handle proving the collectors are registered.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    registry: Registry,
}

impl MetricsHandle {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors already present are left alone.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Requests
        Box::new(REQUESTS_SUBMITTED.clone()),
        Box::new(REQUESTS_COMPLETED.clone()),
        Box::new(REQUEST_LATENCY.clone()),
        Box::new(PROTOCOL_VIOLATIONS.clone()),
        // Acks
        Box::new(ACKS_RECEIVED.clone()),
        Box::new(LOCAL_ACKS_SENT.clone()),
        // Indications
        Box::new(INDICATIONS.clone()),
        Box::new(INDICATION_DELIVERIES.clone()),
        // Wakelocks
        Box::new(WAKELOCK_TIMEOUTS.clone()),
        // Link
        Box::new(ENDPOINT_DEATHS.clone()),
        Box::new(DRAINED_REQUESTS.clone()),
        Box::new(BINDS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// `MetricsRecorder` backed by the global Prometheus collectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRecorder;

impl PrometheusRecorder {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsRecorder for PrometheusRecorder {
    fn record_submitted(&self, kind: RequestKind) {
        crate::metric_inc!(REQUESTS_SUBMITTED, &[kind.name()]);
    }

    fn record_completed(&self, kind: RequestKind, outcome: Outcome, latency: Duration) {
        crate::metric_inc!(REQUESTS_COMPLETED, &[kind.name(), outcome.as_str()]);
        crate::metric_observe!(REQUEST_LATENCY, &[kind.name()], latency.as_secs_f64());
    }

    fn record_protocol_violation(&self) {
        crate::metric_inc!(PROTOCOL_VIOLATIONS);
    }

    fn record_ack_received(&self) {
        crate::metric_inc!(ACKS_RECEIVED);
    }

    fn record_local_ack_sent(&self) {
        crate::metric_inc!(LOCAL_ACKS_SENT);
    }

    fn record_indication(&self, kind: IndicationKind, subscribers: usize) {
        crate::metric_inc!(INDICATIONS, &[kind.name()]);
        INDICATION_DELIVERIES
            .with_label_values(&[kind.name()])
            .inc_by(subscribers as f64);
    }

    fn record_wakelock_timeout(&self, kind: WakelockKind) {
        crate::metric_inc!(WAKELOCK_TIMEOUTS, &[kind.as_str()]);
    }

    fn record_endpoint_death(&self, drained: usize) {
        crate::metric_inc!(ENDPOINT_DEATHS);
        DRAINED_REQUESTS.inc_by(drained as f64);
    }

    fn record_bind(&self, success: bool) {
        let result = if success { "success" } else { "failed" };
        crate::metric_inc!(BINDS, &[result]);
    }
}
