//! Error types for strata-queue
//!
//! This module defines all error types used throughout the queue crates.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the persistent and blocking queues
#[derive(Debug, Error)]
pub enum Error {
    /// Argument rejected before any state was touched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Head requested from an empty queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// Insert refused because the bounded queue is full
    #[error("Queue full: capacity of {capacity} reached")]
    CapacityExceeded {
        /// Configured capacity of the queue
        capacity: u64,
    },

    /// A blocking wait was interrupted before it could complete
    #[error("Wait interrupted")]
    Interrupted,

    /// Failure reported by the storage engine
    #[error("Storage error: {0}")]
    StorageError(#[from] redb::Error),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration could not be parsed or failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Every u64 sequence key has been handed out
    #[error("Sequence key space exhausted")]
    SequenceExhausted,
}

impl Error {
    /// Create a serialization error from anything printable
    pub fn serialization(detail: impl std::fmt::Display) -> Self {
        Error::SerializationError(detail.to_string())
    }

    /// Returns true for failures coming from the storage engine
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageError(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

// redb reports each phase with its own error type; all of them fold into
// `redb::Error` and surface as `StorageError`.
macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(e: $ty) -> Self {
                    Error::StorageError(redb::Error::from(e))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
