//! strata-queue - durable ordered queue with bounded blocking semantics
//!
//! Elements are stored in a redb table keyed by monotonically increasing
//! sequence numbers, so the queue survives restarts and always hands out the
//! oldest element first.
//!
//! # Quick Start
//!
//! ```ignore
//! use strata_queue::{BlockingQueue, PersistentQueue};
//!
//! // Single-threaded, unbounded
//! let queue = PersistentQueue::<String>::open("jobs.redb")?;
//! queue.push("resize:42".to_string())?;
//! assert_eq!(queue.pop()?, Some("resize:42".to_string()));
//!
//! // Shared between threads, at most 100 entries
//! let bounded = BlockingQueue::<i64>::open("events.redb", 100)?;
//! bounded.put(1)?;
//! assert_eq!(bounded.take()?, 1);
//! ```
//!
//! # Architecture
//!
//! - `strata-queue-core`: errors, element codecs, configuration
//! - `strata-queue-storage`: [`PersistentQueue`] over redb
//! - `strata-queue-concurrency`: [`BlockingQueue`], the capacity-bounded,
//!   thread-safe decorator
//!
//! Element types with built-in codecs implement [`Element`]; any serde type
//! can be stored through [`BincodeCodec`].

pub use strata_queue_concurrency::{BlockingQueue, UNBOUNDED};
pub use strata_queue_core::*;
pub use strata_queue_storage::{Database, PersistentQueue, SnapshotIter};
