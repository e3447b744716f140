// Pool throughput benchmarks.
//
// Measures raw acquire/release overhead with a zero-cost resource
// (no I/O, instant create/close).

use std::hint::black_box;
use std::thread;

use criterion::{Criterion, criterion_group, criterion_main};
use respool::{PoolConfiguration, ResourcePool};

fn noop_pool(max_capacity: usize) -> ResourcePool<u64> {
    let config = PoolConfiguration::new()
        .with_initial_capacity(max_capacity)
        .with_max_idle(max_capacity)
        .with_max_capacity(max_capacity)
        .with_factory(|| Ok(0))
        .with_closer(|_| Ok(()));
    ResourcePool::new(config).expect("failed to create pool")
}

fn single_thread_throughput(c: &mut Criterion) {
    let pool = noop_pool(64);

    c.bench_function("single_thread_acquire_release", |b| {
        b.iter(|| {
            let guard = pool.acquire().unwrap();
            black_box(*guard);
        });
    });
}

fn contended_throughput(c: &mut Criterion) {
    // fewer slots than threads so callers queue and hand off
    let pool = noop_pool(2);

    c.bench_function("contended_4_threads_2_slots", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..64 {
                            let guard = pool.acquire().unwrap();
                            black_box(*guard);
                        }
                    });
                }
            });
        });
    });
}

fn async_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to build runtime");
    let pool = noop_pool(64);

    c.bench_function("async_acquire_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let guard = pool.acquire_async().await.unwrap();
                black_box(*guard);
            })
        });
    });
}

criterion_group!(benches, single_thread_throughput, contended_throughput, async_throughput);
criterion_main!(benches);
