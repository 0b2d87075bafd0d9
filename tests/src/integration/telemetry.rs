//! # Telemetry Wiring
//!
//! A proxy built with `PrometheusRecorder` feeds the global collectors while
//! keeping its own in-memory counters for `dump()`.

use std::sync::Arc;

use radio_proxy::{Payload, RadioError, RequestKind};
use radio_telemetry::{
    encode_metrics, register_metrics, PrometheusRecorder, BINDS, DRAINED_REQUESTS,
    REQUESTS_COMPLETED, REQUESTS_SUBMITTED,
};

use super::fixtures::{Harness, Probe};

#[test]
fn test_prometheus_recorder_sees_request_lifecycle() {
    register_metrics().unwrap();
    let h = Harness::with_recorder(Arc::new(PrometheusRecorder::new()));

    let submitted = REQUESTS_SUBMITTED.with_label_values(&["START_LCE"]);
    let unavailable = REQUESTS_COMPLETED.with_label_values(&["START_LCE", "unavailable"]);
    let binds = BINDS.with_label_values(&["success"]);
    let (submitted_before, unavailable_before, binds_before, drained_before) = (
        submitted.get(),
        unavailable.get(),
        binds.get(),
        DRAINED_REQUESTS.get(),
    );

    let probes = [Probe::new(), Probe::new()];
    for probe in &probes {
        h.proxy
            .submit(RequestKind::StartLce, Payload::Ints(vec![1000]), probe.target(), None);
    }
    h.radio.kill();

    assert!(probes
        .iter()
        .all(|probe| probe.single() == Some(Err(RadioError::RemoteUnavailable))));
    assert!(submitted.get() >= submitted_before + 2.0);
    assert!(unavailable.get() >= unavailable_before + 2.0);
    assert!(binds.get() >= binds_before + 1.0);
    assert!(DRAINED_REQUESTS.get() >= drained_before + 2.0);

    // Local counters are still kept alongside the exporter
    let local = h.proxy.metrics();
    assert_eq!(local.submitted, 2);
    assert_eq!(local.drained_requests, 2);

    let text = encode_metrics().unwrap();
    assert!(text.contains("ril_requests_submitted_total{kind=\"START_LCE\"}"));
}
