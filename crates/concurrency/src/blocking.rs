//! BlockingQueue: capacity-bounded, thread-safe view of a PersistentQueue
//!
//! Every operation takes the monitor lock, so the length check and the
//! write that follows it are atomic with respect to other callers. The
//! redb transaction of each operation is nested inside the lock hold.
//!
//! Producers block in `put`/`offer_timeout` while the queue is full;
//! consumers block in `take`/`poll_timeout` while it is empty. Whoever
//! changes the length wakes the other side, one thread per element moved.

use crate::monitor::{Condition, Monitor, WaitState};
use std::path::Path;
use std::time::{Duration, Instant};
use strata_queue_core::{Element, Error, QueueConfig, Result};
use strata_queue_storage::{PersistentQueue, SnapshotIter};
use tracing::{debug, info, trace};

/// Capacity of a queue that never reports full
pub const UNBOUNDED: u64 = u64::MAX;

/// Thread-safe persistent queue with an optional capacity bound.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use strata_queue_concurrency::BlockingQueue;
///
/// let queue = Arc::new(BlockingQueue::<u64>::open("/path/to/jobs.redb", 100)?);
///
/// let producer = Arc::clone(&queue);
/// std::thread::spawn(move || producer.put(42));
///
/// assert_eq!(queue.take()?, 42);
/// ```
pub struct BlockingQueue<T> {
    queue: PersistentQueue<T>,
    capacity: u64,
    monitor: Monitor,
}

impl<T: Element> BlockingQueue<T> {
    /// Open (or create) a bounded queue file with the built-in codec
    pub fn open(path: impl AsRef<Path>, capacity: u64) -> Result<Self> {
        Self::from_queue(PersistentQueue::open(path)?, capacity)
    }

    /// Open with explicit configuration; `config.capacity` bounds the queue
    /// and its absence means unbounded.
    pub fn open_with_config(path: impl AsRef<Path>, config: QueueConfig) -> Result<Self> {
        let capacity = config.capacity.unwrap_or(UNBOUNDED);
        Self::from_queue(PersistentQueue::open_with_config(path, config)?, capacity)
    }
}

impl<T> BlockingQueue<T> {
    /// Wrap an already open queue.
    ///
    /// Fails with `InvalidArgument` for a zero capacity. A queue that
    /// already holds more than `capacity` entries is accepted; producers
    /// block until consumers bring it under the bound.
    pub fn from_queue(queue: PersistentQueue<T>, capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "capacity must be positive".to_string(),
            ));
        }

        info!(
            target: "strata::blocking",
            table = %queue.table_name(),
            capacity,
            "Opened blocking queue"
        );

        Ok(BlockingQueue {
            queue,
            capacity,
            monitor: Monitor::new(),
        })
    }

    /// Wrap an already open queue without a bound
    pub fn unbounded(queue: PersistentQueue<T>) -> Self {
        BlockingQueue {
            queue,
            capacity: UNBOUNDED,
            monitor: Monitor::new(),
        }
    }

    /// Configured capacity (`UNBOUNDED` when there is none)
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Largest sequence key issued so far
    pub fn last_key(&self) -> u64 {
        self.queue.last_key()
    }

    fn is_full(&self) -> Result<bool> {
        Ok(self.queue.len()? >= self.capacity)
    }

    /// Push under the lock and wake one consumer
    fn push_locked(&self, state: &WaitState, element: T) -> Result<()> {
        self.queue.push(element)?;
        self.monitor.signal(state, Condition::NotEmpty, 1);
        Ok(())
    }

    /// Pop under the lock; wakes one producer when something was removed
    fn pop_locked(&self, state: &WaitState) -> Result<Option<T>> {
        let popped = self.queue.pop()?;
        if popped.is_some() {
            self.monitor.signal(state, Condition::NotFull, 1);
        }
        Ok(popped)
    }

    /// Run a removal under the lock and wake one producer per entry it
    /// reports removed. Returns whether anything was removed.
    fn remove_locked(&self, f: impl FnOnce(&PersistentQueue<T>) -> Result<u64>) -> Result<bool> {
        let state = self.monitor.lock();
        let removed = f(&self.queue)?;
        self.monitor.signal(&state, Condition::NotFull, removed);
        Ok(removed > 0)
    }

    // ========== Producers ==========

    /// Insert if there is room, failing with `CapacityExceeded` otherwise
    pub fn add(&self, element: T) -> Result<()> {
        let state = self.monitor.lock();
        if self.is_full()? {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.push_locked(&state, element)
    }

    /// Insert every element in one transaction if they all fit.
    ///
    /// Fails with `CapacityExceeded`, leaving the queue unchanged, when the
    /// batch is larger than the remaining capacity. Returns `false` for an
    /// empty batch.
    pub fn add_all<I>(&self, elements: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
    {
        let batch: Vec<T> = elements.into_iter().collect();
        if batch.is_empty() {
            return Ok(false);
        }

        let state = self.monitor.lock();
        let count = batch.len() as u64;
        if count > self.capacity.saturating_sub(self.queue.len()?) {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.queue.push_all(batch)?;
        self.monitor.signal(&state, Condition::NotEmpty, count);
        Ok(true)
    }

    /// Insert if there is room. Returns `false` when the queue is full.
    pub fn offer(&self, element: T) -> Result<bool> {
        let state = self.monitor.lock();
        if self.is_full()? {
            return Ok(false);
        }
        self.push_locked(&state, element)?;
        Ok(true)
    }

    /// Insert, waiting up to `timeout` for room.
    ///
    /// Returns `false` if the queue is still full at the deadline.
    pub fn offer_timeout(&self, element: T, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.monitor.lock();
        if !self
            .monitor
            .wait_while(&mut state, Condition::NotFull, deadline, || self.is_full())?
        {
            trace!(target: "strata::blocking", ?timeout, "Offer timed out");
            return Ok(false);
        }
        self.push_locked(&state, element)?;
        Ok(true)
    }

    /// Insert, waiting as long as necessary for room.
    ///
    /// Fails with `Interrupted` if `interrupt` is called while waiting.
    pub fn put(&self, element: T) -> Result<()> {
        let mut state = self.monitor.lock();
        self.monitor
            .wait_while(&mut state, Condition::NotFull, None, || self.is_full())?;
        self.push_locked(&state, element)
    }

    // ========== Consumers ==========

    /// Remove the head without waiting; `None` when empty
    pub fn poll(&self) -> Result<Option<T>> {
        let state = self.monitor.lock();
        self.pop_locked(&state)
    }

    /// Remove the head, waiting up to `timeout` for one to arrive
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.monitor.lock();
        if !self
            .monitor
            .wait_while(&mut state, Condition::NotEmpty, deadline, || {
                self.queue.is_empty()
            })?
        {
            trace!(target: "strata::blocking", ?timeout, "Poll timed out");
            return Ok(None);
        }
        self.pop_locked(&state)
    }

    /// Remove the head, waiting as long as necessary for one to arrive.
    ///
    /// Fails with `Interrupted` if `interrupt` is called while waiting.
    pub fn take(&self) -> Result<T> {
        let mut state = self.monitor.lock();
        self.monitor
            .wait_while(&mut state, Condition::NotEmpty, None, || {
                self.queue.is_empty()
            })?;
        self.pop_locked(&state)?.ok_or(Error::EmptyQueue)
    }

    /// Remove the head, failing with `EmptyQueue` when there is none
    pub fn remove_head(&self) -> Result<T> {
        self.poll()?.ok_or(Error::EmptyQueue)
    }

    /// Move up to `max` elements into `sink`, waking one producer per slot
    /// freed
    pub fn drain_to<E>(&self, sink: &mut E, max: usize) -> Result<usize>
    where
        E: Extend<T>,
    {
        let state = self.monitor.lock();
        let drained = self.queue.drain_to(sink, max)?;
        self.monitor
            .signal(&state, Condition::NotFull, drained as u64);
        Ok(drained)
    }

    /// Move every element into `sink`
    pub fn drain_all<E>(&self, sink: &mut E) -> Result<usize>
    where
        E: Extend<T>,
    {
        self.drain_to(sink, usize::MAX)
    }

    /// Remove every element. Returns how many were removed.
    pub fn clear(&self) -> Result<u64> {
        let state = self.monitor.lock();
        let removed = self.queue.clear()?;
        self.monitor.signal(&state, Condition::NotFull, removed);
        Ok(removed)
    }

    // ========== Inspection ==========

    /// Head without removing it
    pub fn peek(&self) -> Result<Option<T>> {
        let _state = self.monitor.lock();
        self.queue.peek()
    }

    /// Head, failing with `EmptyQueue` when there is none
    pub fn element(&self) -> Result<T> {
        let _state = self.monitor.lock();
        self.queue.element()
    }

    /// Number of stored elements
    pub fn len(&self) -> Result<u64> {
        let _state = self.monitor.lock();
        self.queue.len()
    }

    /// True when no elements are stored
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// How many more elements fit before the queue is full
    pub fn remaining_capacity(&self) -> Result<u64> {
        let _state = self.monitor.lock();
        Ok(self.capacity.saturating_sub(self.queue.len()?))
    }

    /// Point-in-time iterator, head first
    pub fn iter(&self) -> Result<SnapshotIter<T>> {
        let _state = self.monitor.lock();
        self.queue.iter()
    }

    /// All elements, head first
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.iter()?.collect())
    }

    // ========== Waiters ==========

    /// Fail every `put`, `take` and timed variant currently waiting with
    /// `Error::Interrupted`. The queue itself is left unchanged.
    pub fn interrupt(&self) {
        debug!(
            target: "strata::blocking",
            table = %self.queue.table_name(),
            "Interrupting waiters"
        );
        self.monitor.interrupt();
    }

    /// Threads currently blocked waiting for room
    pub fn waiting_producers(&self) -> usize {
        self.monitor.lock().waiting_producers()
    }

    /// Threads currently blocked waiting for an element
    pub fn waiting_consumers(&self) -> usize {
        self.monitor.lock().waiting_consumers()
    }

    /// Unwrap the underlying persistent queue
    pub fn into_inner(self) -> PersistentQueue<T> {
        self.queue
    }

    /// Release the queue handle
    pub fn close(self) {
        self.queue.close();
    }
}

impl<T: PartialEq> BlockingQueue<T> {
    /// True if any element equals `target`
    pub fn contains(&self, target: &T) -> Result<bool> {
        let _state = self.monitor.lock();
        self.queue.contains(target)
    }

    /// True if every element of `targets` is present
    pub fn contains_all(&self, targets: &[T]) -> Result<bool> {
        let _state = self.monitor.lock();
        self.queue.contains_all(targets)
    }

    /// Remove the first element equal to `target`
    pub fn remove(&self, target: &T) -> Result<bool> {
        self.remove_locked(|queue| Ok(u64::from(queue.remove(target)?)))
    }

    /// Remove every element equal to any of `targets`
    pub fn remove_all(&self, targets: &[T]) -> Result<bool> {
        self.remove_locked(|queue| queue.remove_all(targets))
    }

    /// Keep only elements equal to one of `targets`
    pub fn retain_all(&self, targets: &[T]) -> Result<bool> {
        self.remove_locked(|queue| queue.retain_all(targets))
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("queue", &self.queue)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn open_bounded(dir: &TempDir, capacity: u64) -> BlockingQueue<i32> {
        let config = QueueConfig::for_testing().with_capacity(capacity);
        BlockingQueue::open_with_config(dir.path().join("queue.redb"), config).unwrap()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        while !condition() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = TempDir::new().unwrap();
        let queue =
            PersistentQueue::<i32>::open_with_config(dir.path().join("q.redb"), QueueConfig::for_testing())
                .unwrap();
        assert!(matches!(
            BlockingQueue::from_queue(queue, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_config_without_capacity_is_unbounded() {
        let dir = TempDir::new().unwrap();
        let queue = BlockingQueue::<i32>::open_with_config(
            dir.path().join("q.redb"),
            QueueConfig::for_testing(),
        )
        .unwrap();
        assert_eq!(queue.capacity(), UNBOUNDED);
        queue.add(1).unwrap();
        assert_eq!(queue.remaining_capacity().unwrap(), UNBOUNDED - 1);
    }

    #[test]
    fn test_add_all_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let queue = open_bounded(&dir, 3);
        queue.add(1).unwrap();

        assert!(matches!(
            queue.add_all(vec![2, 3, 4]),
            Err(Error::CapacityExceeded { capacity: 3 })
        ));
        assert_eq!(queue.len().unwrap(), 1);

        assert!(queue.add_all(vec![2, 3]).unwrap());
        assert_eq!(queue.to_vec().unwrap(), vec![1, 2, 3]);
        assert!(!queue.add_all(Vec::new()).unwrap());
    }

    #[test]
    fn test_remove_head_and_element() {
        let dir = TempDir::new().unwrap();
        let queue = open_bounded(&dir, 2);

        assert!(matches!(queue.element(), Err(Error::EmptyQueue)));
        assert!(matches!(queue.remove_head(), Err(Error::EmptyQueue)));

        queue.add(5).unwrap();
        assert_eq!(queue.element().unwrap(), 5);
        assert_eq!(queue.remove_head().unwrap(), 5);
    }

    #[test]
    fn test_into_inner_keeps_contents() {
        let dir = TempDir::new().unwrap();
        let queue = open_bounded(&dir, 2);
        queue.add(1).unwrap();

        let inner = queue.into_inner();
        assert_eq!(inner.to_vec().unwrap(), vec![1]);
    }

    // === Wakeups That Find The Condition Still False ===

    #[test]
    fn test_offer_timeout_keeps_original_deadline_after_wakeup() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(open_bounded(&dir, 1));
        queue.add(1).unwrap();
        let timeout = Duration::from_secs(1);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let start = Instant::now();
                let offered = queue.offer_timeout(2, timeout).unwrap();
                (offered, start.elapsed())
            })
        };
        wait_for(|| queue.waiting_producers() == 1);
        thread::sleep(Duration::from_millis(600));

        // Free the slot, wake the producer, and refill before it runs
        {
            let state = queue.monitor.lock();
            assert_eq!(queue.queue.pop().unwrap(), Some(1));
            queue.monitor.signal(&state, Condition::NotFull, 1);
            queue.queue.push(3).unwrap();
        }

        let (offered, elapsed) = producer.join().unwrap();
        assert!(!offered);
        assert!(elapsed >= timeout, "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "returned after {:?}", elapsed);
        assert_eq!(queue.to_vec().unwrap(), vec![3]);
        assert_eq!(queue.waiting_producers(), 0);
    }

    #[test]
    fn test_poll_timeout_keeps_original_deadline_after_wakeup() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(open_bounded(&dir, 4));
        let timeout = Duration::from_secs(1);

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let start = Instant::now();
                let polled = queue.poll_timeout(timeout).unwrap();
                (polled, start.elapsed())
            })
        };
        wait_for(|| queue.waiting_consumers() == 1);
        thread::sleep(Duration::from_millis(600));

        // Insert, wake the consumer, and take the element back before it runs
        {
            let state = queue.monitor.lock();
            queue.queue.push(7).unwrap();
            queue.monitor.signal(&state, Condition::NotEmpty, 1);
            assert_eq!(queue.queue.pop().unwrap(), Some(7));
        }

        let (polled, elapsed) = consumer.join().unwrap();
        assert_eq!(polled, None);
        assert!(elapsed >= timeout, "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "returned after {:?}", elapsed);
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.waiting_consumers(), 0);
    }
}
