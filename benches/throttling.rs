use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use pipeline_throttle::{EventCounter, Limiter, SystemClock, ThrottleFilter};
use std::sync::Arc;

/// Benchmark the hot path with limiting disabled (the common idle case).
fn bench_process_unlimited(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_unlimited");

    for batch_size in [1usize, 10, 100, 1000] {
        let filter = ThrottleFilter::builder().build().unwrap();
        let batch: Vec<u64> = (0..batch_size as u64).collect();

        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_function(format!("batch_{}", batch_size), |b| {
            b.iter_batched(
                || batch.clone(),
                |batch| filter.process(black_box(batch), &|event: &u64| {
                    black_box(event);
                }),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark the hot path with a limiter installed at a rate far above
/// the benchmark's own throughput, so reservations never wait.
fn bench_process_limited(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_limited");

    let filter = ThrottleFilter::builder().build().unwrap();
    let limiter = Limiter::new(
        "1000000000".parse().unwrap(),
        Arc::new(SystemClock::new()),
    )
    .unwrap();
    filter.limiter_cell().install(Arc::new(limiter));

    let batch: Vec<u64> = (0..100).collect();

    group.throughput(Throughput::Elements(100));
    group.bench_function("batch_100", |b| {
        b.iter_batched(
            || batch.clone(),
            |batch| filter.process(black_box(batch), &|event: &u64| {
                black_box(event);
            }),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark the counter under contention from parallel incrementers.
fn bench_counter_contention(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("counter");

    group.bench_function("add_uncontended", |b| {
        let counter = EventCounter::new();
        b.iter(|| counter.add(black_box(10)));
    });

    group.bench_function("add_4_threads", |b| {
        b.iter_custom(|iters| {
            let counter = EventCounter::new();
            let started = std::time::Instant::now();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let counter = counter.clone();
                    thread::spawn(move || {
                        for _ in 0..iters {
                            counter.add(black_box(10));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            started.elapsed()
        });
    });

    group.finish();
}

/// Benchmark reading the limiter cell, the per-batch overhead the swap
/// design puts on the hot path.
fn bench_cell_read(c: &mut Criterion) {
    let filter = ThrottleFilter::builder().build().unwrap();
    let cell = filter.limiter_cell();

    c.bench_function("cell_read_empty", |b| {
        b.iter(|| black_box(cell.current().is_some()))
    });

    let limiter = Limiter::new("1000".parse().unwrap(), Arc::new(SystemClock::new())).unwrap();
    cell.install(Arc::new(limiter));

    c.bench_function("cell_read_installed", |b| {
        b.iter(|| black_box(cell.current().map(|l| l.rate())))
    });
}

criterion_group!(
    benches,
    bench_process_unlimited,
    bench_process_limited,
    bench_counter_contention,
    bench_cell_read
);
criterion_main!(benches);
