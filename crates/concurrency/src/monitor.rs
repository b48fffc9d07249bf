//! Lock and condition variables shared by every blocking-queue operation
//!
//! One `parking_lot::Mutex` serializes all queue operations. Two condition
//! variables park threads until the queue is non-empty (consumers) or has a
//! free slot (producers). The mutex guards only bookkeeping for the waits;
//! the queue data lives in redb and is touched while the guard is held.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Instant;
use strata_queue_core::{Error, Result};
use tracing::trace;

/// Which condition a thread is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Condition {
    /// Consumers wait for an element to arrive
    NotEmpty,
    /// Producers wait for a free slot
    NotFull,
}

/// State protected by the monitor lock
#[derive(Debug, Default)]
pub(crate) struct WaitState {
    /// Bumped by every interrupt; a waiter that sees it change gives up
    epoch: u64,
    waiting_consumers: usize,
    waiting_producers: usize,
}

impl WaitState {
    fn waiters(&self, condition: Condition) -> usize {
        match condition {
            Condition::NotEmpty => self.waiting_consumers,
            Condition::NotFull => self.waiting_producers,
        }
    }

    fn waiters_mut(&mut self, condition: Condition) -> &mut usize {
        match condition {
            Condition::NotEmpty => &mut self.waiting_consumers,
            Condition::NotFull => &mut self.waiting_producers,
        }
    }

    pub(crate) fn waiting_consumers(&self) -> usize {
        self.waiting_consumers
    }

    pub(crate) fn waiting_producers(&self) -> usize {
        self.waiting_producers
    }
}

pub(crate) struct Monitor {
    state: Mutex<WaitState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Monitor {
    pub(crate) fn new() -> Self {
        Monitor {
            state: Mutex::new(WaitState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.state.lock()
    }

    fn condvar(&self, condition: Condition) -> &Condvar {
        match condition {
            Condition::NotEmpty => &self.not_empty,
            Condition::NotFull => &self.not_full,
        }
    }

    /// Park on `condition` while `blocked` reports true.
    ///
    /// The predicate is re-evaluated under the lock after every wakeup.
    /// Returns `Ok(true)` once `blocked` is false, `Ok(false)` if `deadline`
    /// passes first, and `Err(Interrupted)` if `interrupt` runs while this
    /// thread is parked. `None` waits without a deadline.
    pub(crate) fn wait_while<F>(
        &self,
        guard: &mut MutexGuard<'_, WaitState>,
        condition: Condition,
        deadline: Option<Instant>,
        mut blocked: F,
    ) -> Result<bool>
    where
        F: FnMut() -> Result<bool>,
    {
        let epoch = guard.epoch;
        let condvar = self.condvar(condition);

        loop {
            if !blocked()? {
                return Ok(true);
            }

            *guard.waiters_mut(condition) += 1;
            let timed_out = match deadline {
                Some(deadline) => condvar.wait_until(guard, deadline).timed_out(),
                None => {
                    condvar.wait(guard);
                    false
                }
            };
            *guard.waiters_mut(condition) -= 1;

            if guard.epoch != epoch {
                trace!(target: "strata::blocking", ?condition, "Wait interrupted");
                // A signal meant for a live waiter may have landed here
                if let Ok(false) = blocked() {
                    self.signal(&**guard, condition, 1);
                }
                return Err(Error::Interrupted);
            }
            if timed_out {
                return Ok(!blocked()?);
            }
        }
    }

    /// Wake up to `count` threads parked on `condition`.
    ///
    /// Never signals more threads than are registered as waiting, and stops
    /// early once a signal finds nobody to wake.
    pub(crate) fn signal(&self, state: &WaitState, condition: Condition, count: u64) {
        let waiters = state.waiters(condition) as u64;
        let condvar = self.condvar(condition);
        for _ in 0..count.min(waiters) {
            if !condvar.notify_one() {
                break;
            }
        }
    }

    /// Fail every wait currently in progress with `Error::Interrupted`.
    ///
    /// Threads that start waiting afterwards are unaffected.
    pub(crate) fn interrupt(&self) {
        let mut state = self.state.lock();
        self.interrupt_locked(&mut state);
    }

    fn interrupt_locked(&self, state: &mut WaitState) {
        state.epoch = state.epoch.wrapping_add(1);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
