//! Multi-threaded tests for strata-queue-concurrency
//!
//! These tests run real producers and consumers against one queue file:
//!
//! 1. **Unique Delivery** - every element is handed to exactly one consumer
//! 2. **Capacity Bound** - the length never exceeds the capacity
//! 3. **Per-Producer Order** - a producer's elements come out in its order
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use strata_queue_concurrency::BlockingQueue;
use strata_queue_core::QueueConfig;
use tempfile::TempDir;

fn open_shared(dir: &TempDir, capacity: Option<u64>) -> Arc<BlockingQueue<u64>> {
    let mut config = QueueConfig::for_testing();
    config.capacity = capacity;
    Arc::new(BlockingQueue::open_with_config(dir.path().join("concurrent.redb"), config).unwrap())
}

// ============================================================================
// Unique Delivery
// ============================================================================

#[test]
fn test_concurrent_pollers_receive_each_item_once() {
    const ITEMS: u64 = 200;
    const POLLERS: usize = 4;

    let dir = TempDir::new().unwrap();
    let queue = open_shared(&dir, None);
    queue.add_all(0..ITEMS).unwrap();

    let barrier = Arc::new(Barrier::new(POLLERS));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..POLLERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                barrier.wait();
                while let Some(item) = queue.poll().unwrap() {
                    seen.lock().push(item);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let seen = seen.lock();
    assert_eq!(seen.len() as u64, ITEMS);
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len() as u64, ITEMS);
    assert!(queue.is_empty().unwrap());
}

#[test]
fn test_producers_and_consumers_bounded() {
    const PRODUCERS: u64 = 3;
    const PER_PRODUCER: u64 = 50;
    const CAPACITY: u64 = 5;

    let dir = TempDir::new().unwrap();
    let queue = open_shared(&dir, Some(CAPACITY));
    let barrier = Arc::new(Barrier::new(PRODUCERS as usize + 2));
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_PRODUCER {
                    queue.put(p * 1_000 + i).unwrap();
                }
            })
        })
        .collect();

    // Samples the length while producers and consumers race
    let watcher = {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            let mut max_seen = 0;
            while !done.load(Ordering::Acquire) {
                max_seen = max_seen.max(queue.len().unwrap());
                thread::yield_now();
            }
            max_seen
        })
    };

    barrier.wait();
    let mut received = Vec::new();
    while (received.len() as u64) < PRODUCERS * PER_PRODUCER {
        if let Some(item) = queue.poll_timeout(Duration::from_secs(5)).unwrap() {
            received.push(item);
        }
    }

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let max_seen = watcher.join().unwrap();

    assert!(max_seen <= CAPACITY, "length {} exceeded capacity", max_seen);
    assert!(queue.is_empty().unwrap());

    // Each producer's elements arrive in the order it put them
    for p in 0..PRODUCERS {
        let mine: Vec<_> = received
            .iter()
            .copied()
            .filter(|item| item / 1_000 == p)
            .collect();
        let expected: Vec<_> = (0..PER_PRODUCER).map(|i| p * 1_000 + i).collect();
        assert_eq!(mine, expected);
    }
}

#[test]
fn test_blocked_takers_all_served() {
    const TAKERS: usize = 4;

    let dir = TempDir::new().unwrap();
    let queue = open_shared(&dir, Some(2));

    let takers: Vec<_> = (0..TAKERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take().unwrap())
        })
        .collect();

    for item in 0..TAKERS as u64 {
        queue.put(item).unwrap();
    }

    let mut got: Vec<_> = takers.into_iter().map(|h| h.join().unwrap()).collect();
    got.sort();
    assert_eq!(got, vec![0, 1, 2, 3]);
}

#[test]
fn test_concurrent_offers_respect_capacity() {
    const THREADS: usize = 8;
    const CAPACITY: u64 = 3;

    let dir = TempDir::new().unwrap();
    let queue = open_shared(&dir, Some(CAPACITY));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS as u64)
        .map(|v| {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                queue.offer(v).unwrap()
            })
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|accepted| *accepted)
        .count();

    assert_eq!(accepted as u64, CAPACITY);
    assert_eq!(queue.len().unwrap(), CAPACITY);
}
