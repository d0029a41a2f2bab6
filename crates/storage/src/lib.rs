//! # Cirrus Storage
//!
//! Durable substrate for the replicated log.
//!
//! The [`LogStore`] persists log entries keyed by index together with the
//! node's hard state (current term, voted-for) in RocksDB column families.
//! The store is opened once per process and flushed at shutdown; a reported
//! commit is always recoverable after restart.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod store;

pub use store::{LogStore, LogStoreConfig};

use thiserror::Error;

/// Errors from the persistence layer. These are fatal to the consensus
/// loop: the node must stop cleanly rather than run on an inconsistent log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A requested column family is missing from the database.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A stored log entry does not match its key.
    #[error("corrupt log entry at index {index}: {message}")]
    CorruptEntry {
        /// Index the entry was stored under.
        index: u64,
        /// Description of the mismatch.
        message: String,
    },
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
