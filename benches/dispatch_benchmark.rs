//! Dispatch throughput benchmark suite for taskhost.
//!
//! Benchmarks the hot paths of a hosted computation:
//! - Engine start to completion (thread spawn + first poll + join)
//! - Continuation dispatch through the engine's FIFO queue
//! - Root suspension/resume round trips via `yield_now`
//! - Late-continuation hand-off to the orphan drain service
//!
//! Performance targets:
//! - Continuation dispatch: < 1µs per entry once the loop is hot
//! - Yield round trip: < 2µs

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskhost::{Continuation, DrainConfig, DrainService, Engine, EngineCx, Error};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn bench_drain() -> Arc<DrainService> {
    DrainService::start(DrainConfig::default().with_thread_name("bench-drain"))
        .expect("drain service")
}

// =============================================================================
// ENGINE LIFECYCLE
// =============================================================================

fn bench_engine_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_lifecycle");
    let drain = bench_drain();

    group.bench_function("start_join_ready", |b| {
        b.iter(|| {
            let engine = Engine::start(
                Arc::clone(&drain),
                |n: u64, _cx: EngineCx| async move { Ok::<_, Error>(n) },
                black_box(7),
            )
            .expect("spawn");
            black_box(engine.join().expect("join"))
        })
    });

    group.finish();
}

// =============================================================================
// CONTINUATION DISPATCH
// =============================================================================

fn bench_continuation_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuation_dispatch");
    let drain = bench_drain();

    for &count in &[100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("schedule_fifo", count), &count, |b, &n| {
            b.iter(|| {
                let engine = Engine::start(
                    Arc::clone(&drain),
                    move |n: u64, cx: EngineCx| async move {
                        let hits = Arc::new(AtomicU64::new(0));
                        for _ in 0..n {
                            let hits = Arc::clone(&hits);
                            cx.schedule(move || {
                                hits.fetch_add(1, Ordering::Relaxed);
                            });
                        }
                        cx.yield_now().await;
                        Ok::<_, Error>(hits.load(Ordering::Relaxed))
                    },
                    n,
                )
                .expect("spawn");
                black_box(engine.join().expect("join"))
            })
        });

        group.bench_with_input(BenchmarkId::new("yield_round_trip", count), &count, |b, &n| {
            b.iter(|| {
                let engine = Engine::start(
                    Arc::clone(&drain),
                    move |n: u64, cx: EngineCx| async move {
                        for _ in 0..n {
                            cx.yield_now().await;
                        }
                        Ok::<_, Error>(n)
                    },
                    n,
                )
                .expect("spawn");
                black_box(engine.join().expect("join"))
            })
        });
    }

    group.finish();
}

// =============================================================================
// DRAIN HAND-OFF
// =============================================================================

fn bench_drain_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_handoff");
    let drain = bench_drain();
    let engine = Engine::start(
        Arc::clone(&drain),
        |(), _cx: EngineCx| async move { Ok::<_, Error>(()) },
        (),
    )
    .expect("spawn");
    engine.result().expect("result");
    while !engine.is_thread_exited() {
        std::thread::yield_now();
    }
    let adapter = engine.adapter();

    for &count in &[100u64, 1_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("forward_late", count), &count, |b, &n| {
            b.iter(|| {
                for _ in 0..n {
                    adapter.schedule(Continuation::new(|| {}));
                }
                assert!(drain.wait_idle(Duration::from_secs(10)));
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_engine_lifecycle,
    bench_continuation_dispatch,
    bench_drain_handoff
);
criterion_main!(benches);
