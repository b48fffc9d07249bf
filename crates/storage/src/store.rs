//! redb handle and transaction helpers for one queue table
//!
//! Every queue operation runs inside exactly one redb transaction:
//! - write helpers commit when the closure returns `Ok` and abort otherwise
//! - read helpers see a consistent snapshot for their whole duration
//!
//! The table is created lazily by the first write; readers treat a missing
//! table as an empty queue.

use redb::{
    Database, ReadOnlyTable, ReadableTable, Table, TableDefinition, TableError, WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use strata_queue_core::{DurabilityMode, QueueConfig, Result};
use tracing::warn;

/// Writable view of the entry table: sequence key -> encoded element
pub(crate) type Entries<'txn> = Table<'txn, u64, &'static [u8]>;

/// Read-only view of the entry table
pub(crate) type ReadEntries = ReadOnlyTable<u64, &'static [u8]>;

/// Table definition type for the entry table
pub(crate) type EntriesDef<'a> = TableDefinition<'a, u64, &'static [u8]>;

/// Owns the redb database handle and names the table a queue lives in.
pub(crate) struct QueueStore {
    db: Arc<Database>,
    table: String,
    durability: DurabilityMode,
}

impl QueueStore {
    /// Open (or create) the database file at `path`.
    pub(crate) fn open(path: &Path, config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Database::builder();
        if let Some(bytes) = config.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = builder.create(path)?;
        Ok(Self::with_database(Arc::new(db), config))
    }

    /// Use an already opened database; the queue lives in `config.table`.
    pub(crate) fn with_database(db: Arc<Database>, config: &QueueConfig) -> Self {
        QueueStore {
            db,
            table: config.table.clone(),
            durability: config.durability,
        }
    }

    pub(crate) fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub(crate) fn table_name(&self) -> &str {
        &self.table
    }

    fn definition(&self) -> EntriesDef<'_> {
        TableDefinition::new(&self.table)
    }

    /// Run `f` in an exclusive write transaction.
    ///
    /// Commits when `f` returns `Ok`; any error aborts the transaction so
    /// none of its writes become visible.
    pub(crate) fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WriteTransaction, EntriesDef<'_>) -> Result<R>,
    {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(self.durability.into());

        match f(&txn, self.definition()) {
            Ok(out) => {
                txn.commit()?;
                Ok(out)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(
                        target: "strata::queue",
                        table = %self.table,
                        error = %abort_err,
                        "Failed to abort write transaction"
                    );
                }
                Err(e)
            }
        }
    }

    /// Run `f` against the entry table inside a write transaction.
    pub(crate) fn write_entries<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Entries<'_>) -> Result<R>,
    {
        self.write(|txn, def| {
            let mut table = txn.open_table(def)?;
            f(&mut table)
        })
    }

    /// Run `f` against a read-only snapshot of the entry table.
    ///
    /// `f` receives `None` when the table has never been written.
    pub(crate) fn read_entries<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(Option<&ReadEntries>) -> Result<R>,
    {
        let txn = self.db.begin_read()?;
        match txn.open_table(self.definition()) {
            Ok(table) => f(Some(&table)),
            Err(TableError::TableDoesNotExist(_)) => f(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Largest sequence key present in `table`, or 0 when it is empty.
pub(crate) fn last_key<R>(table: &R) -> Result<u64>
where
    R: ReadableTable<u64, &'static [u8]>,
{
    Ok(table.last()?.map(|(key, _)| key.value()).unwrap_or(0))
}
