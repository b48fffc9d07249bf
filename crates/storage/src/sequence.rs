//! Sequence key allocation
//!
//! The counter caches the largest key this handle has committed. It is never
//! persisted on its own: on open it is seeded from the largest key found in
//! the table, and the table stays the source of truth for every allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use strata_queue_core::{Error, Result};

/// In-memory high-water mark of issued sequence keys
#[derive(Debug)]
pub(crate) struct SequenceCounter {
    /// Largest key committed through this handle (or recovered at open)
    last: AtomicU64,
}

impl SequenceCounter {
    /// Create a counter seeded from the store's largest key
    pub(crate) fn new(seed: u64) -> Self {
        SequenceCounter {
            last: AtomicU64::new(seed),
        }
    }

    /// Last issued key (0 before the first push)
    pub(crate) fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    /// First key of a block of `count` keys following `persisted_max`.
    ///
    /// Never returns a key at or below the cached high-water mark, so keys
    /// freed by deleting the tail or by `clear` are not handed out again
    /// while this handle lives.
    pub(crate) fn reserve(&self, persisted_max: u64, count: u64) -> Result<u64> {
        let first = persisted_max
            .max(self.current())
            .checked_add(1)
            .ok_or(Error::SequenceExhausted)?;
        first
            .checked_add(count.saturating_sub(1))
            .ok_or(Error::SequenceExhausted)?;
        Ok(first)
    }

    /// Record a committed key. Only ever moves forward.
    pub(crate) fn advance(&self, committed: u64) {
        self.last.fetch_max(committed, Ordering::SeqCst);
    }
}
