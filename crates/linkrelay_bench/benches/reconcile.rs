//! Reconciliation and relay loop benchmarks.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use linkrelay_bench::{envelope_batch, scripted_stream};
use linkrelay_engine::{
    JournalRecordStore, MemoryRecordStore, Reconciler, Relay, RelayConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Benchmark applying a batch through the reconciler.
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    for count in [100usize, 1_000] {
        let batch = envelope_batch(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("memory", count), &batch, |b, batch| {
            b.iter_batched(
                || Reconciler::new(Arc::new(MemoryRecordStore::new())),
                |reconciler| {
                    for raw in batch {
                        reconciler.apply_raw(raw);
                    }
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("journal", count), &batch, |b, batch| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let store = JournalRecordStore::open(&dir.path().join("bench.journal")).unwrap();
                    (dir, Reconciler::new(Arc::new(store)))
                },
                |(_dir, reconciler)| {
                    for raw in batch {
                        reconciler.apply_raw(raw);
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark the full relay loop over a scripted broker.
fn bench_relay(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay");
    let config = RelayConfig::new("bench:9092", "links")
        .with_poll_timeout(Duration::ZERO)
        .with_reconnect_delay(Duration::ZERO);

    for count in [1_000usize, 10_000] {
        let batch = envelope_batch(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &batch, |b, batch| {
            b.iter_batched(
                || {
                    let connector = scripted_stream("links", batch);
                    let relay = Relay::new(
                        config.clone(),
                        connector.clone(),
                        Arc::new(MemoryRecordStore::new()),
                    );
                    (connector, relay)
                },
                |(connector, mut relay)| {
                    while !connector.is_drained() {
                        relay.step();
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply, bench_relay);
criterion_main!(benches);
