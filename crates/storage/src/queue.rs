//! PersistentQueue: durable FIFO queue over a redb table
//!
//! ## Design Principles
//!
//! 1. **One transaction per operation**: every call opens exactly one redb
//!    transaction. Bulk operations are all-or-nothing.
//!
//! 2. **Keys from the store**: a push reads the largest persisted key and
//!    writes at the next one inside the same write transaction. The cached
//!    counter is only advanced after the commit succeeds.
//!
//! 3. **No renumbering**: deleting an entry never touches other keys; the
//!    head is always the entry with the smallest key.
//!
//! ## Key Design
//!
//! - Table: `config.table` (default `"queue"`)
//! - Key: `u64` sequence number, starting at 1
//! - Value: codec bytes of the element

use crate::iter::SnapshotIter;
use crate::sequence::SequenceCounter;
use crate::store::{last_key, QueueStore};
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::path::Path;
use std::sync::Arc;
use strata_queue_core::{Codec, Element, Error, QueueConfig, Result};
use tracing::{debug, info, trace};

/// Durable, strictly FIFO queue
///
/// # Example
///
/// ```ignore
/// use strata_queue_storage::PersistentQueue;
///
/// let queue = PersistentQueue::<String>::open("/path/to/queue.redb")?;
/// queue.push("resize:42".to_string())?;
///
/// assert_eq!(queue.peek()?, Some("resize:42".to_string()));
/// assert_eq!(queue.pop()?, Some("resize:42".to_string()));
/// assert_eq!(queue.pop()?, None);
/// ```
pub struct PersistentQueue<T> {
    store: QueueStore,
    codec: Box<dyn Codec<T>>,
    sequence: SequenceCounter,
}

impl<T: Element> PersistentQueue<T> {
    /// Open (or create) a queue file with the element's built-in codec
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, QueueConfig::default())
    }

    /// Open with explicit configuration and the element's built-in codec
    pub fn open_with_config(path: impl AsRef<Path>, config: QueueConfig) -> Result<Self> {
        Self::open_with_codec(path, config, T::default_codec())
    }
}

impl<T> PersistentQueue<T> {
    /// Open (or create) a queue file with an explicit codec
    pub fn open_with_codec(
        path: impl AsRef<Path>,
        config: QueueConfig,
        codec: impl Codec<T> + 'static,
    ) -> Result<Self> {
        let path = path.as_ref();
        let store = QueueStore::open(path, &config)?;
        info!(target: "strata::queue", path = ?path, "Opened queue database");
        Self::recover(store, Box::new(codec))
    }

    /// Open a queue inside an existing database.
    ///
    /// Several queues can share one file as long as each uses its own
    /// `config.table`. Two handles on the same table are not supported.
    pub fn with_database(
        db: Arc<Database>,
        config: QueueConfig,
        codec: impl Codec<T> + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Self::recover(QueueStore::with_database(db, &config), Box::new(codec))
    }

    /// Seed the sequence counter from the largest persisted key
    fn recover(store: QueueStore, codec: Box<dyn Codec<T>>) -> Result<Self> {
        let (seed, entries) = store.read_entries(|table| match table {
            Some(table) => Ok((last_key(table)?, table.len()?)),
            None => Ok((0, 0)),
        })?;

        info!(
            target: "strata::queue",
            table = %store.table_name(),
            codec = codec.codec_id(),
            last_key = seed,
            entries,
            "Recovered queue"
        );

        Ok(PersistentQueue {
            store,
            codec,
            sequence: SequenceCounter::new(seed),
        })
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        self.store.database()
    }

    /// Name of the table holding the entries
    pub fn table_name(&self) -> &str {
        self.store.table_name()
    }

    /// Largest sequence key issued by this handle, or recovered at open
    pub fn last_key(&self) -> u64 {
        self.sequence.current()
    }

    /// Release this handle.
    ///
    /// Every operation has already committed, so this only drops the
    /// database reference. The file is closed once no other queue shares it.
    pub fn close(self) {
        info!(
            target: "strata::queue",
            table = %self.table_name(),
            last_key = self.last_key(),
            shared = Arc::strong_count(self.database()) > 1,
            "Closed queue"
        );
    }

    // ========== Insertion ==========

    /// Append an element at the tail
    pub fn push(&self, element: T) -> Result<()> {
        let bytes = self.codec.encode(&element)?;

        let key = self.store.write_entries(|table| {
            let key = self.sequence.reserve(last_key(&*table)?, 1)?;
            table.insert(key, bytes.as_slice())?;
            Ok(key)
        })?;
        self.sequence.advance(key);

        trace!(target: "strata::queue", table = %self.table_name(), key, "Pushed");
        Ok(())
    }

    /// Append all elements, in iteration order, in one transaction.
    ///
    /// Keys form one contiguous block. Returns `false` when `elements` was
    /// empty. If any element fails to encode nothing is written.
    pub fn push_all<I>(&self, elements: I) -> Result<bool>
    where
        I: IntoIterator<Item = T>,
    {
        let encoded = elements
            .into_iter()
            .map(|element| self.codec.encode(&element))
            .collect::<Result<Vec<_>>>()?;
        if encoded.is_empty() {
            return Ok(false);
        }

        let count = encoded.len() as u64;
        let last = self.store.write_entries(|table| {
            let first = self.sequence.reserve(last_key(&*table)?, count)?;
            for (offset, bytes) in encoded.iter().enumerate() {
                table.insert(first + offset as u64, bytes.as_slice())?;
            }
            Ok(first + (count - 1))
        })?;
        self.sequence.advance(last);

        debug!(target: "strata::queue", table = %self.table_name(), count, last_key = last, "Pushed batch");
        Ok(true)
    }

    /// Append a snapshot of another queue's elements.
    ///
    /// Fails with `InvalidArgument` when `source` is this queue.
    pub fn push_all_from(&self, source: &PersistentQueue<T>) -> Result<bool> {
        if std::ptr::eq(self, source) {
            return Err(Error::InvalidArgument(
                "cannot append a queue to itself".to_string(),
            ));
        }
        self.push_all(source.iter()?)
    }

    // ========== Retrieval ==========

    /// Remove and return the head, or `None` when the queue is empty.
    ///
    /// The element is decoded before the delete commits; a decode failure
    /// leaves the entry in place.
    pub fn pop(&self) -> Result<Option<T>> {
        let popped = self.store.write_entries(|table| match table.pop_first()? {
            Some((_, value)) => self.codec.decode(value.value()).map(Some),
            None => Ok(None),
        })?;

        if popped.is_some() {
            trace!(target: "strata::queue", table = %self.table_name(), "Popped");
        }
        Ok(popped)
    }

    /// Return the head without removing it
    pub fn peek(&self) -> Result<Option<T>> {
        self.store.read_entries(|table| {
            let Some(table) = table else {
                return Ok(None);
            };
            match table.first()? {
                Some((_, value)) => self.codec.decode(value.value()).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Return the head, failing with `EmptyQueue` when there is none
    pub fn element(&self) -> Result<T> {
        self.peek()?.ok_or(Error::EmptyQueue)
    }

    /// Remove the head, failing with `EmptyQueue` when there is none
    pub fn remove_head(&self) -> Result<T> {
        self.pop()?.ok_or(Error::EmptyQueue)
    }

    /// Move up to `max` elements from the head into `sink`, in FIFO order.
    ///
    /// Runs in one transaction; `sink` only receives elements once the
    /// removal has committed. Returns the number of elements moved.
    pub fn drain_to<E>(&self, sink: &mut E, max: usize) -> Result<usize>
    where
        E: Extend<T>,
    {
        if max == 0 {
            return Ok(0);
        }

        let drained = self.store.write_entries(|table| {
            let mut drained = Vec::new();
            while drained.len() < max {
                match table.pop_first()? {
                    Some((_, value)) => drained.push(self.codec.decode(value.value())?),
                    None => break,
                }
            }
            Ok(drained)
        })?;

        let count = drained.len();
        sink.extend(drained);
        if count > 0 {
            debug!(target: "strata::queue", table = %self.table_name(), count, "Drained");
        }
        Ok(count)
    }

    /// Move every element into `sink`
    pub fn drain_all<E>(&self, sink: &mut E) -> Result<usize>
    where
        E: Extend<T>,
    {
        self.drain_to(sink, usize::MAX)
    }

    // ========== Inspection ==========

    /// Number of live entries
    pub fn len(&self) -> Result<u64> {
        self.store.read_entries(|table| match table {
            Some(table) => Ok(table.len()?),
            None => Ok(0),
        })
    }

    /// True when the queue holds no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Point-in-time iterator over all elements, head first
    pub fn iter(&self) -> Result<SnapshotIter<T>> {
        let elements = self.store.read_entries(|table| {
            let Some(table) = table else {
                return Ok(Vec::new());
            };
            let mut elements = Vec::with_capacity(table.len()? as usize);
            for entry in table.iter()? {
                let (_, value) = entry?;
                elements.push(self.codec.decode(value.value())?);
            }
            Ok(elements)
        })?;
        Ok(SnapshotIter::new(elements))
    }

    /// All elements, head first, as a vector
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.iter()?.collect())
    }

    // ========== Bulk Removal ==========

    /// Remove every entry in one transaction. Returns how many were removed.
    ///
    /// The sequence counter keeps its high-water mark, so keys issued after a
    /// clear still exceed every key issued before it.
    pub fn clear(&self) -> Result<u64> {
        let removed = self.store.write(|txn, def| {
            let count = txn.open_table(def)?.len()?;
            if count > 0 {
                txn.delete_table(def)?;
            }
            Ok(count)
        })?;

        debug!(target: "strata::queue", table = %self.table_name(), removed, "Cleared");
        Ok(removed)
    }

    /// Delete every entry whose element satisfies `predicate`, in one
    /// transaction. Returns how many were removed.
    fn delete_where<P>(&self, mut predicate: P) -> Result<u64>
    where
        P: FnMut(&T) -> bool,
    {
        let removed = self.store.write_entries(|table| {
            let mut doomed = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                if predicate(&self.codec.decode(value.value())?) {
                    doomed.push(key.value());
                }
            }
            for key in &doomed {
                table.remove(*key)?;
            }
            Ok(doomed.len() as u64)
        })?;

        if removed > 0 {
            debug!(target: "strata::queue", table = %self.table_name(), removed, "Deleted matching entries");
        }
        Ok(removed)
    }
}

impl<T: PartialEq> PersistentQueue<T> {
    /// Key of the first entry equal to `target`
    fn position<R>(&self, table: &R, target: &T) -> Result<Option<u64>>
    where
        R: ReadableTable<u64, &'static [u8]>,
    {
        for entry in table.iter()? {
            let (key, value) = entry?;
            if self.codec.decode(value.value())? == *target {
                return Ok(Some(key.value()));
            }
        }
        Ok(None)
    }

    /// True if any element equals `target`
    pub fn contains(&self, target: &T) -> Result<bool> {
        self.store.read_entries(|table| match table {
            Some(table) => Ok(self.position(table, target)?.is_some()),
            None => Ok(false),
        })
    }

    /// True if every element of `targets` is present.
    ///
    /// Checked against one snapshot; stops at the first missing element.
    /// An empty `targets` is trivially contained.
    pub fn contains_all(&self, targets: &[T]) -> Result<bool> {
        self.store.read_entries(|table| {
            for target in targets {
                let found = match table {
                    Some(table) => self.position(table, target)?.is_some(),
                    None => false,
                };
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// Remove the first entry equal to `target`. Returns whether one was found.
    pub fn remove(&self, target: &T) -> Result<bool> {
        self.store.write_entries(|table| match self.position(&*table, target)? {
            Some(key) => {
                table.remove(key)?;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Remove every entry equal to any of `targets`.
    ///
    /// Returns how many entries were removed. An empty `targets` is a no-op.
    pub fn remove_all(&self, targets: &[T]) -> Result<u64> {
        if targets.is_empty() {
            return Ok(0);
        }
        self.delete_where(|element| targets.contains(element))
    }

    /// Keep only entries equal to one of `targets`.
    ///
    /// Returns how many entries were removed. An empty `targets` clears the
    /// queue.
    pub fn retain_all(&self, targets: &[T]) -> Result<u64> {
        if targets.is_empty() {
            return self.clear();
        }
        self.delete_where(|element| !targets.contains(element))
    }
}

impl<T> std::fmt::Debug for PersistentQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentQueue")
            .field("table", &self.table_name())
            .field("codec", &self.codec.codec_id())
            .field("last_key", &self.last_key())
            .finish()
    }
}
