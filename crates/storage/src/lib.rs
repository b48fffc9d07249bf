//! Persistent queue storage for strata-queue
//!
//! This crate implements the durable FIFO queue on top of redb:
//! - PersistentQueue: ordered queue keyed by monotonically increasing `u64`
//!   sequence numbers, one redb transaction per operation
//! - SnapshotIter: point-in-time iteration over the queue contents
//!
//! # Ordering
//!
//! Entries are stored under their sequence key, so redb's key order is the
//! queue order. A push always writes one past the largest key ever seen by
//! the handle; deletions never renumber.
//!
//! # Sharing a database
//!
//! Several queues can live in one redb file, each in its own table, via
//! `PersistentQueue::with_database`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod iter;
mod queue;
mod sequence;
mod store;

pub use iter::SnapshotIter;
pub use queue::PersistentQueue;

// Database handle type for `PersistentQueue::with_database`
pub use redb::Database;
