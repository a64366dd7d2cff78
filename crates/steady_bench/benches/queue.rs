//! Work queue benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use steady_bench::keys;
use steady_queue::{ExponentialFailureRateLimiter, RateLimiter, WorkQueue};

/// Benchmark a full add/get/done cycle.
fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");

    group.bench_function("single_key", |b| {
        let queue = WorkQueue::new("bench");
        let key = "default/global".to_string();
        b.iter(|| {
            queue.add(key.clone());
            let got = queue.get().unwrap();
            queue.done(black_box(&got));
        });
    });

    for count in [16, 256, 4096] {
        let keys = keys(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("many_keys", count), &keys, |b, keys| {
            let queue = WorkQueue::new("bench");
            b.iter(|| {
                for key in keys {
                    queue.add(key.clone());
                }
                while !queue.is_empty() {
                    let got = queue.get().unwrap();
                    queue.done(&got);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark repeated adds of keys that are already queued.
fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");

    for repeats in [10, 100, 1000] {
        group.throughput(Throughput::Elements(repeats as u64));
        group.bench_with_input(BenchmarkId::new("repeated_add", repeats), &repeats, |b, &repeats| {
            let queue = WorkQueue::new("bench");
            let key = "default/global".to_string();
            b.iter(|| {
                for _ in 0..repeats {
                    queue.add(key.clone());
                }
                let got = queue.get().unwrap();
                queue.done(&got);
            });
        });
    }

    group.finish();
}

/// Benchmark backoff computation.
fn bench_backoff(c: &mut Criterion) {
    c.bench_function("exponential_when_forget", |b| {
        let limiter = ExponentialFailureRateLimiter::<String>::default();
        let key = "default/global".to_string();
        b.iter(|| {
            for _ in 0..8 {
                black_box(limiter.when(&key));
            }
            limiter.forget(&key);
        });
    });
}

criterion_group!(benches, bench_cycle, bench_dedup, bench_backoff);
criterion_main!(benches);
