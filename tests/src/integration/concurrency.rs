//! # Concurrency
//!
//! Many callers and the transport's callback threads hit the proxy at once.
//! These tests check that completion stays exactly-once and that wakelock
//! and serial accounting survive the interleavings.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use radio_proxy::adapters::LoopbackRadio;
use radio_proxy::{Payload, RadioApi, RadioError, RadioProxy, RequestKind, Serial, WakelockKind};

use super::fixtures::{Harness, Probe};

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

fn submit_many(h: &Harness, kind: RequestKind) -> Vec<(Serial, Probe)> {
    thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    (0..PER_THREAD)
                        .map(|_| {
                            let probe = Probe::new();
                            let serial = h.proxy.submit(kind, Payload::None, probe.target(), None);
                            (serial, probe)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    })
}

#[test]
fn test_concurrent_submissions_get_unique_serials() {
    let h = Harness::new();
    let submitted = submit_many(&h, RequestKind::GetCurrentCalls);
    let total = THREADS * PER_THREAD;

    let serials: HashSet<Serial> = submitted.iter().map(|(serial, _)| *serial).collect();
    assert_eq!(serials.len(), total);
    assert_eq!(h.proxy.pending_count(), total);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), total);

    h.radio.kill();
    assert!(submitted.iter().all(|(_, probe)| probe.count() == 1));
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
}

#[test]
fn test_racing_replies_complete_exactly_once() {
    let h = Harness::new();
    let submitted = submit_many(&h, RequestKind::VoiceRegistrationState);
    let serials: Vec<Serial> = submitted.iter().map(|(serial, _)| *serial).collect();
    let responders = 4;

    thread::scope(|scope| {
        for r in 0..responders {
            let radio = h.radio.clone();
            let serials = &serials;
            scope.spawn(move || {
                let ordered: Box<dyn Iterator<Item = &Serial>> = if r % 2 == 0 {
                    Box::new(serials.iter())
                } else {
                    Box::new(serials.iter().rev())
                };
                for serial in ordered {
                    radio.reply(*serial, 0, Payload::Ints(vec![r as i32]), false);
                }
            });
        }
    });

    assert!(submitted.iter().all(|(_, probe)| probe.single().is_some()));
    let metrics = h.proxy.metrics();
    assert_eq!(metrics.completed_success as usize, serials.len());
    assert_eq!(
        metrics.protocol_violations as usize,
        serials.len() * (responders - 1)
    );
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
}

#[test]
fn test_deaths_racing_submissions_lose_nothing() {
    let h = Harness::new();
    h.proxy.connect().unwrap();

    let submitted = thread::scope(|scope| {
        let radio = h.radio.clone();
        let killer = scope.spawn(move || {
            let mut kills = 0;
            for _ in 0..50 {
                if radio.kill().is_some() {
                    kills += 1;
                }
                thread::yield_now();
            }
            kills
        });
        let submitted = submit_many(&h, RequestKind::DataRegistrationState);
        assert!(killer.join().unwrap() > 0);
        submitted
    });

    // Whatever survived belongs to the live handle.
    for pending in h.proxy.pending() {
        h.radio.reply(pending.serial, 0, Payload::None, false);
    }

    for (_, probe) in &submitted {
        match probe.single() {
            Some(Ok(Payload::None)) | Some(Err(RadioError::RemoteUnavailable)) => {}
            other => panic!("unexpected completion: {:?}", other),
        }
    }
    assert_eq!(h.proxy.pending_count(), 0);
    assert_eq!(h.proxy.wakelock_count(WakelockKind::Request), 0);
    assert_eq!(h.proxy.metrics().completed() as usize, THREADS * PER_THREAD);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_awaiting_callers_on_tokio_runtime() {
    let radio = LoopbackRadio::new();
    let proxy = RadioProxy::builder(Arc::new(radio.clone())).build().unwrap();
    let api: Arc<dyn RadioApi> = proxy.clone();
    let callers = 64;

    let tasks: Vec<_> = (0..callers)
        .map(|_| {
            let api = api.clone();
            tokio::spawn(async move { api.request(RequestKind::GetImei, Payload::None, None).await })
        })
        .collect();

    let responder = tokio::spawn(async move {
        let mut answered = HashSet::new();
        while answered.len() < callers {
            for command in radio.sent() {
                if answered.insert(command.serial) {
                    radio.reply(command.serial, 0, Payload::Ints(vec![command.serial.0]), false);
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    for task in tasks {
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Ok(Payload::Ints(_))));
    }
    responder.await.unwrap();
    assert_eq!(proxy.pending_count(), 0);
}
