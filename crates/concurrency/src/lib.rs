//! Blocking access to persistent queues
//!
//! This crate wraps `PersistentQueue` for multi-threaded producers and
//! consumers:
//! - BlockingQueue: capacity bound, blocking `put`/`take`, timed
//!   `offer_timeout`/`poll_timeout`, interruptible waits
//! - a single-lock monitor with `not_empty`/`not_full` condition variables
//!
//! All operations on one `BlockingQueue` are serialized by its lock. Share
//! it between threads with `Arc`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blocking;
mod monitor;

pub use blocking::{BlockingQueue, UNBOUNDED};
