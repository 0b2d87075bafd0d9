//! # Request Lifecycle Scenarios
//!
//! Each test drives one complete path a request can take through the proxy:
//! real reply, early ack followed by the payload, endpoint death, and the
//! bounded wait that substitutes a neutral payload.

use proptest::prelude::*;
use std::time::Duration;

use radio_proxy::{
    Epoch, IndicationKind, LinkPhase, Payload, RadioError, RequestKind, RequestState, Serial,
    WakelockKind, ACTIVITY_INFO_FIELDS,
};

use super::fixtures::{Harness, Probe};

// =============================================================================
// CORRELATION
// =============================================================================

#[test]
fn test_replies_out_of_order_reach_their_own_callers() {
    let h = Harness::new();
    let (c, d) = (Probe::new(), Probe::new());

    let serial_c = h
        .proxy
        .submit(RequestKind::GetImei, Payload::None, c.target(), None);
    let serial_d = h
        .proxy
        .submit(RequestKind::GetImsi, Payload::None, d.target(), None);
    assert_ne!(serial_c, serial_d);

    h.radio.reply(serial_d, 0, Payload::Strings(vec!["310260000000001".into()]), false);
    assert_eq!(c.count(), 0);
    h.radio.reply(serial_c, 0, Payload::Strings(vec!["35209900176148".into()]), false);

    assert_eq!(c.single(), Some(Ok(Payload::Strings(vec!["35209900176148".into()]))));
    assert_eq!(d.single(), Some(Ok(Payload::Strings(vec!["310260000000001".into()]))));
    assert_eq!(h.proxy.pending_count(), 0);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
}

#[test]
fn test_remote_error_code_is_rejection() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::Dial, Payload::Strings(vec!["911".into()]), probe.target(), None);

    h.radio.reply(serial, 2, Payload::None, false);

    assert_eq!(probe.single(), Some(Err(RadioError::RemoteRejected { code: 2 })));
    assert_eq!(h.proxy.metrics().completed_rejected, 1);
}

#[test]
fn test_radio_not_available_reply_is_rejection_not_link_failure() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::SendSms, Payload::None, probe.target(), None);

    h.radio.reply(serial, radio_proxy::codes::RADIO_NOT_AVAILABLE, Payload::None, false);

    assert_eq!(probe.single(), Some(Err(RadioError::RemoteRejected { code: 1 })));
    assert_eq!(h.proxy.phase(), LinkPhase::Bound);
    let metrics = h.proxy.metrics();
    assert_eq!(metrics.completed_rejected, 1);
    assert_eq!(metrics.completed_unavailable, 0);
}

#[test]
fn test_duplicate_reply_is_dropped() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::Operator, Payload::None, probe.target(), None);

    h.radio.reply(serial, 0, Payload::Strings(vec!["T-Mobile".into()]), false);
    h.radio.reply(serial, 0, Payload::Strings(vec!["AT&T".into()]), false);

    assert_eq!(probe.single(), Some(Ok(Payload::Strings(vec!["T-Mobile".into()]))));
    assert_eq!(h.proxy.metrics().protocol_violations, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_any_reply_order_correlates(order in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle()) {
        let h = Harness::new();
        let probes: Vec<Probe> = (0..order.len()).map(|_| Probe::new()).collect();
        let serials: Vec<Serial> = probes
            .iter()
            .map(|probe| h.proxy.submit(RequestKind::SignalStrength, Payload::None, probe.target(), None))
            .collect();

        for &i in &order {
            h.radio.reply(serials[i], 0, Payload::Ints(vec![i as i32]), false);
        }

        for (i, probe) in probes.iter().enumerate() {
            prop_assert_eq!(probe.single(), Some(Ok(Payload::Ints(vec![i as i32]))));
        }
        prop_assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
    }
}

// =============================================================================
// ACKNOWLEDGMENTS
// =============================================================================

#[test]
fn test_ack_then_payload_releases_once_and_completes_once() {
    let h = Harness::new();
    let (e, other) = (Probe::new(), Probe::new());
    let serial_e = h
        .proxy
        .submit(RequestKind::SetupDataCall, Payload::None, e.target(), None);
    h.proxy
        .submit(RequestKind::GetCurrentCalls, Payload::None, other.target(), None);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 2);

    h.radio.ack(serial_e);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 1);
    assert_eq!(e.count(), 0);
    let pending = h.proxy.pending();
    let entry = pending.iter().find(|p| p.serial == serial_e).unwrap();
    assert_eq!(entry.state, RequestState::Acked);
    assert_eq!(entry.wakelock, WakelockKind::None);

    h.advance_ms(50);
    h.radio.reply(serial_e, 0, Payload::Ints(vec![1, 5, 0]), false);

    assert_eq!(e.single(), Some(Ok(Payload::Ints(vec![1, 5, 0]))));
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 1);
    assert_eq!(other.count(), 0);
    assert_eq!(h.proxy.metrics().acks_received, 1);
}

#[test]
fn test_duplicate_ack_changes_nothing() {
    let h = Harness::new();
    let (a, b) = (Probe::new(), Probe::new());
    let serial = h.proxy.submit(RequestKind::Hangup, Payload::None, a.target(), None);
    h.proxy.submit(RequestKind::Hangup, Payload::None, b.target(), None);

    h.radio.ack(serial);
    h.radio.ack(serial);

    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 1);
    assert_eq!(h.proxy.pending_count(), 2);
}

#[test]
fn test_ack_required_reply_sends_local_ack_and_holds_ack_guard() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::GetSimStatus, Payload::None, probe.target(), None);

    h.radio.reply(serial, 0, Payload::Ints(vec![1]), true);

    assert_eq!(probe.single(), Some(Ok(Payload::Ints(vec![1]))));
    assert_eq!(h.radio.local_acks(), 1);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Ack), 1);
    assert!(h.power.is_held(WakelockKind::Ack));

    h.advance_ms(h.proxy.config().ack_wakelock_timeout_ms);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Ack), 0);
    assert!(!h.power.is_held(WakelockKind::Ack));
}

#[test]
fn test_indication_reaches_subscribers_and_is_acked() {
    let h = Harness::new();
    h.proxy.connect().unwrap();
    let mut first = h.proxy.subscribe(IndicationKind::SignalStrength);
    let mut second = h.proxy.subscribe(IndicationKind::SignalStrength);
    let mut other = h.proxy.subscribe(IndicationKind::NewSms);

    h.radio
        .indicate(IndicationKind::SignalStrength, Payload::Ints(vec![-85, 99]), true);

    assert_eq!(first.try_recv().unwrap().payload, Payload::Ints(vec![-85, 99]));
    assert_eq!(second.try_recv().unwrap().kind, IndicationKind::SignalStrength);
    assert!(other.try_recv().is_err());
    assert_eq!(h.radio.local_acks(), 1);
    assert_eq!(h.proxy.metrics().indications_dispatched, 1);
}

// =============================================================================
// ENDPOINT DEATH
// =============================================================================

#[test]
fn test_death_before_reply_fails_request() {
    let h = Harness::new();
    let probe = Probe::new();
    h.proxy.submit(RequestKind::Dial, Payload::None, probe.target(), None);
    assert!(h.power.is_held(WakelockKind::Request));

    let cookie = h.radio.kill().unwrap();

    assert_eq!(probe.single(), Some(Err(RadioError::RemoteUnavailable)));
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
    assert!(!h.power.is_held(WakelockKind::Request));
    assert_eq!(h.proxy.pending_count(), 0);
    assert_eq!(h.proxy.phase(), LinkPhase::Dead);
    assert!(h.proxy.epoch() > cookie);
}

#[test]
fn test_reconnects_after_fixed_delay() {
    let h = Harness::new();
    h.proxy.connect().unwrap();
    h.radio.kill();
    assert_eq!(h.radio.binds(), 1);

    h.scheduler.advance(h.reconnect_delay() - Duration::from_millis(1));
    assert_eq!(h.radio.binds(), 1);

    h.advance_ms(1);
    assert_eq!(h.radio.binds(), 2);
    assert_eq!(h.proxy.phase(), LinkPhase::Bound);

    let probe = Probe::new();
    let serial = h.proxy.submit(RequestKind::GetImei, Payload::None, probe.target(), None);
    h.radio.reply(serial, 0, Payload::None, false);
    assert_eq!(probe.single(), Some(Ok(Payload::None)));
}

#[test]
fn test_stale_death_has_no_effect() {
    let h = Harness::new();
    let probes = [Probe::new(), Probe::new()];
    for probe in &probes {
        h.proxy.submit(RequestKind::GetCellInfoList, Payload::None, probe.target(), None);
    }
    let epoch = h.proxy.epoch();

    assert!(h.radio.report_death(Epoch(epoch.0 - 1)));

    assert_eq!(h.proxy.epoch(), epoch);
    assert_eq!(h.proxy.phase(), LinkPhase::Bound);
    assert_eq!(h.proxy.pending_count(), 2);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 2);
    assert!(probes.iter().all(|probe| probe.count() == 0));
}

#[test]
fn test_death_of_superseded_handle_after_reconnect_is_ignored() {
    let h = Harness::new();
    h.proxy.connect().unwrap();
    let old = h.radio.kill().unwrap();
    h.scheduler.advance(h.reconnect_delay());

    let probe = Probe::new();
    h.proxy.submit(RequestKind::GetHardwareConfig, Payload::None, probe.target(), None);
    h.radio.report_death(old);

    assert_eq!(h.proxy.pending_count(), 1);
    assert_eq!(probe.count(), 0);
    assert_eq!(h.proxy.metrics().endpoint_deaths, 1);
}

#[test]
fn test_bind_failure_fails_fast_then_retries() {
    let h = Harness::new();
    h.radio.fail_next_binds(1);
    let probe = Probe::new();

    h.proxy.submit(RequestKind::RadioPower, Payload::Ints(vec![1]), probe.target(), None);

    assert_eq!(probe.single(), Some(Err(RadioError::RemoteUnavailable)));
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
    assert_ne!(h.proxy.phase(), LinkPhase::Bound);

    h.scheduler.advance(h.reconnect_delay());
    assert_eq!(h.proxy.phase(), LinkPhase::Bound);
    assert_eq!(h.radio.bind_attempts(), 2);
}

// =============================================================================
// BOUNDED WAIT
// =============================================================================

#[test]
fn test_blocking_request_gets_neutral_default_and_late_reply_is_dropped() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::GetActivityInfo, Payload::None, probe.target(), None);

    h.advance_ms(1999);
    assert_eq!(probe.count(), 0);
    h.advance_ms(1);

    let neutral = Ok(Payload::Ints(vec![0; ACTIVITY_INFO_FIELDS]));
    assert_eq!(probe.single(), Some(neutral.clone()));
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);

    h.radio
        .reply(serial, 0, Payload::Ints(vec![7; ACTIVITY_INFO_FIELDS]), false);
    assert_eq!(probe.single(), Some(neutral));
    assert_eq!(h.proxy.metrics().completed_timed_out, 1);
    assert_eq!(h.proxy.metrics().protocol_violations, 1);
}

#[test]
fn test_blocking_request_answered_in_time_gets_real_payload() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h
        .proxy
        .submit(RequestKind::PullLceData, Payload::None, probe.target(), None);

    h.advance_ms(500);
    h.radio.reply(serial, 0, Payload::Ints(vec![12000, 80, 0]), false);
    h.advance_ms(5000);

    assert_eq!(probe.single(), Some(Ok(Payload::Ints(vec![12000, 80, 0]))));
    assert_eq!(h.proxy.metrics().completed_timed_out, 0);
}

#[test]
fn test_blocking_timer_does_not_outlive_death() {
    let h = Harness::new();
    let probe = Probe::new();
    h.proxy
        .submit(RequestKind::GetActivityInfo, Payload::None, probe.target(), None);

    h.radio.kill();
    h.scheduler.advance(h.reconnect_delay() + Duration::from_secs(3));

    assert_eq!(probe.single(), Some(Err(RadioError::RemoteUnavailable)));
    assert_eq!(h.proxy.metrics().completed_timed_out, 0);
}

// =============================================================================
// WAKELOCK ACCOUNTING
// =============================================================================

#[test]
fn test_wakelock_count_returns_to_zero_across_all_paths() {
    let h = Harness::new();
    let probes: Vec<Probe> = (0..8).map(|_| Probe::new()).collect();
    let kinds = [
        RequestKind::GetImei,
        RequestKind::SetupDataCall,
        RequestKind::GetActivityInfo,
        RequestKind::Dial,
        RequestKind::GetImsi,
        RequestKind::SendSms,
        RequestKind::PullLceData,
        RequestKind::Operator,
    ];
    let serials: Vec<Serial> = probes
        .iter()
        .zip(kinds)
        .map(|(probe, kind)| h.proxy.submit(kind, Payload::None, probe.target(), None))
        .collect();
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 8);

    // Real reply, ack then reply, ack only
    h.radio.reply(serials[0], 0, Payload::None, false);
    h.radio.ack(serials[1]);
    h.radio.reply(serials[1], 0, Payload::None, true);
    h.radio.ack(serials[3]);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 5);

    // Neutral defaults for the two blocking kinds
    h.advance_ms(2000);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 3);

    // Everything else drained by a death
    h.radio.kill();

    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
    assert!(!h.power.is_held(WakelockKind::Request));
    assert!(probes.iter().all(|probe| probe.count() == 1));
    assert_eq!(h.proxy.metrics().completed(), 8);
}

#[test]
fn test_dump_reflects_live_state() {
    let h = Harness::new();
    let probe = Probe::new();
    let serial = h.proxy.submit(RequestKind::DeviceIdentity, Payload::None, probe.target(), None);

    let dump = h.proxy.dump();
    assert!(dump.contains("Pending requests: 1"));
    assert!(dump.contains(&format!("[{}] DEVICE_IDENTITY", serial)));
    assert!(dump.contains("phase=bound"));

    h.radio.reply(serial, 0, Payload::None, false);
    assert!(h.proxy.dump().contains("Pending requests: 0"));
}
