//! Queue Benchmarks
//!
//! ## Benchmark Groups
//!
//! - `queue_push/*`: single-element append, one transaction each
//! - `queue_push_all/*`: batch append in one transaction, by batch size
//! - `queue_cycle/*`: push followed by pop (steady state, empty queue)
//! - `blocking_cycle/*`: offer followed by poll through the lock
//!
//! ## Durability Modes
//!
//! Write benchmarks label their durability mode:
//! - `dur_standard`: eventual fsync
//! - `dur_always`: fsync on every commit
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench queue_benchmarks
//! cargo bench --bench queue_benchmarks -- "queue_cycle"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use strata_queue::{BlockingQueue, DurabilityMode, PersistentQueue, QueueConfig};
use tempfile::TempDir;

// =============================================================================
// Utilities
// =============================================================================

fn open_queue(dir: &TempDir, durability: DurabilityMode) -> PersistentQueue<u64> {
    let config = QueueConfig::default().with_durability(durability);
    PersistentQueue::open_with_config(dir.path().join("bench.redb"), config).unwrap()
}

// =============================================================================
// Persistent Queue
// =============================================================================

fn queue_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push");
    group.throughput(Throughput::Elements(1));

    for (label, mode) in [
        ("dur_standard", DurabilityMode::Standard),
        ("dur_always", DurabilityMode::Always),
    ] {
        let dir = TempDir::new().unwrap();
        let queue = open_queue(&dir, mode);
        let mut value = 0u64;

        group.bench_function(label, |b| {
            b.iter(|| {
                value += 1;
                queue.push(black_box(value)).unwrap();
            })
        });
    }

    group.finish();
}

fn queue_push_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_all");

    for batch in [10u64, 100, 1_000] {
        let dir = TempDir::new().unwrap();
        let queue = open_queue(&dir, DurabilityMode::Standard);

        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::new("dur_standard", batch), &batch, |b, &batch| {
            b.iter(|| {
                queue.push_all(0..batch).unwrap();
            })
        });
    }

    group.finish();
}

fn queue_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_cycle");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, DurabilityMode::Standard);

    group.bench_function("push_pop/dur_standard", |b| {
        b.iter(|| {
            queue.push(black_box(42)).unwrap();
            black_box(queue.pop().unwrap());
        })
    });

    // Pop cost with a deep backlog ahead of the head
    queue.push_all(0..10_000).unwrap();
    group.bench_function("push_pop_backlog_10k/dur_standard", |b| {
        b.iter(|| {
            queue.push(black_box(42)).unwrap();
            black_box(queue.pop().unwrap());
        })
    });

    group.finish();
}

// =============================================================================
// Blocking Queue
// =============================================================================

fn blocking_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_cycle");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().unwrap();
    let queue = BlockingQueue::from_queue(open_queue(&dir, DurabilityMode::Standard), 1_000).unwrap();

    group.bench_function("offer_poll/dur_standard", |b| {
        b.iter(|| {
            queue.offer(black_box(7)).unwrap();
            black_box(queue.poll().unwrap());
        })
    });

    group.finish();
}

criterion_group!(
    name = persistent;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(20);
    targets = queue_push, queue_push_all, queue_cycle
);

criterion_group!(
    name = blocking;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(20);
    targets = blocking_cycle
);

criterion_main!(persistent, blocking);
