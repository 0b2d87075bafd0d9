//! # Radio Proxy Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | Ledger | admit + complete by serial |
//! | Proxy | submit + solicited reply through the loopback endpoint |
//! | Proxy | submit a batch, then fail it with one endpoint death |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use radio_proxy::adapters::{LoopbackRadio, ManualScheduler, NoopPowerGuard};
use radio_proxy::{Payload, RadioProxy, RequestKind, RequestLedger, ResultTarget, WorkSource};

fn build_proxy() -> (Arc<RadioProxy>, LoopbackRadio) {
    let radio = LoopbackRadio::new();
    let proxy = RadioProxy::builder(Arc::new(radio.clone()))
        .scheduler(Arc::new(ManualScheduler::new()))
        .power_guard(Arc::new(NoopPowerGuard))
        .build()
        .unwrap();
    (proxy, radio)
}

// ============================================================================
// Ledger
// ============================================================================

fn bench_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger");
    group.measurement_time(Duration::from_secs(5));

    let ledger = RequestLedger::new(4);
    group.bench_function("admit_complete", |b| {
        b.iter(|| {
            let serial = ledger.admit(
                RequestKind::GetImei,
                ResultTarget::Detached,
                WorkSource::default(),
                None,
            );
            black_box(ledger.complete(serial))
        })
    });

    for depth in [16usize, 256, 4096] {
        let ledger = RequestLedger::new(4);
        for _ in 0..depth {
            ledger.admit(RequestKind::Dial, ResultTarget::Detached, WorkSource::default(), None);
        }
        group.bench_with_input(BenchmarkId::new("admit_complete_at_depth", depth), &depth, |b, _| {
            b.iter(|| {
                let serial = ledger.admit(
                    RequestKind::GetImei,
                    ResultTarget::Detached,
                    WorkSource::default(),
                    None,
                );
                black_box(ledger.complete(serial))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Proxy
// ============================================================================

fn bench_proxy_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("proxy");
    let (proxy, radio) = build_proxy();

    group.bench_function("submit_reply", |b| {
        b.iter(|| {
            let serial = proxy.submit(RequestKind::GetImei, Payload::None, ResultTarget::Detached, None);
            black_box(radio.reply(serial, 0, Payload::None, false))
        })
    });

    for batch in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("drain_on_death", batch), &batch, |b, &batch| {
            b.iter(|| {
                let (proxy, radio) = build_proxy();
                for _ in 0..batch {
                    proxy.submit(RequestKind::Dial, Payload::None, ResultTarget::Detached, None);
                }
                black_box(radio.kill())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ledger, bench_proxy_round_trip);
criterion_main!(benches);
