//! RocksDB-backed log store.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteOptions,
};
use tracing::{debug, info};

use cirrus_types::LogEntry;

use crate::{Result, StorageError};

/// Column family names.
pub mod cf {
    /// Log entries keyed by big-endian index.
    pub const LOG: &str = "log";
    /// Hard state: current term and voted-for.
    pub const META: &str = "meta";

    /// All column families.
    pub const ALL: &[&str] = &[LOG, META];
}

const KEY_CURRENT_TERM: &[u8] = b"current_term";
const KEY_VOTED_FOR: &[u8] = b"voted_for";

/// Log store configuration.
#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    /// Path to the database directory.
    pub path: String,
    /// Whether every write syncs to disk before returning. Leaving this on
    /// is what makes a reported commit recoverable after a crash.
    pub sync_writes: bool,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            path: String::from("./data/cirrus"),
            sync_writes: true,
        }
    }
}

/// Persistent store for the replicated log and hard state.
pub struct LogStore {
    inner: DBWithThreadMode<MultiThreaded>,
    config: LogStoreConfig,
}

impl LogStore {
    /// Open or create the store at the configured path.
    pub fn open(config: LogStoreConfig) -> Result<Self> {
        info!(path = %config.path, "opening log store");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf::ALL
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            Path::new(&config.path),
            cf_descriptors,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(Self { inner: db, config })
    }

    /// Open with default configuration rooted at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(LogStoreConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.inner
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    /// Persist a log entry under its index.
    pub fn put_entry(&self, entry: &LogEntry) -> Result<()> {
        let cf = self.handle(cf::LOG)?;
        let value =
            serde_json::to_vec(entry).map_err(|e| StorageError::Codec(e.to_string()))?;
        self.inner
            .put_cf_opt(&cf, entry.index.to_be_bytes(), value, &self.write_opts())
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Load every persisted entry in ascending index order.
    pub fn load_entries(&self) -> Result<Vec<LogEntry>> {
        let cf = self.handle(cf::LOG)?;
        let mut entries = Vec::new();
        // Big-endian keys make the lexicographic iteration numeric.
        for item in self.inner.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StorageError::Database(e.to_string()))?;
            let index = decode_index(&key)?;
            let entry: LogEntry = serde_json::from_slice(&value)
                .map_err(|e| StorageError::Codec(e.to_string()))?;
            if entry.index != index {
                return Err(StorageError::CorruptEntry {
                    index,
                    message: format!("entry carries index {}", entry.index),
                });
            }
            entries.push(entry);
        }
        debug!(count = entries.len(), "loaded log entries");
        Ok(entries)
    }

    /// Delete every entry with index strictly greater than `index`.
    pub fn truncate_after(&self, index: u64) -> Result<()> {
        let cf = self.handle(cf::LOG)?;
        let from = index.saturating_add(1).to_be_bytes();
        let to = u64::MAX.to_be_bytes();
        self.inner
            .delete_range_cf(&cf, from, to)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        // delete_range is exclusive of the upper bound.
        self.inner
            .delete_cf_opt(&cf, to, &self.write_opts())
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// The persisted current term, 0 for a fresh store.
    pub fn current_term(&self) -> Result<u64> {
        let cf = self.handle(cf::META)?;
        let value = self
            .inner
            .get_cf(&cf, KEY_CURRENT_TERM)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        match value {
            Some(bytes) if bytes.len() == 8 => {
                Ok(u64::from_be_bytes(bytes.as_slice().try_into().unwrap()))
            }
            Some(bytes) => Err(StorageError::Codec(format!(
                "current_term has {} bytes, expected 8",
                bytes.len()
            ))),
            None => Ok(0),
        }
    }

    /// Persist the current term.
    pub fn set_current_term(&self, term: u64) -> Result<()> {
        let cf = self.handle(cf::META)?;
        self.inner
            .put_cf_opt(&cf, KEY_CURRENT_TERM, term.to_be_bytes(), &self.write_opts())
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// The persisted vote for the current term, if any.
    pub fn voted_for(&self) -> Result<Option<String>> {
        let cf = self.handle(cf::META)?;
        let value = self
            .inner
            .get_cf(&cf, KEY_VOTED_FOR)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        match value {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    /// Persist (or clear) the vote for the current term.
    pub fn set_voted_for(&self, node_id: Option<&str>) -> Result<()> {
        let cf = self.handle(cf::META)?;
        match node_id {
            Some(id) => self
                .inner
                .put_cf_opt(&cf, KEY_VOTED_FOR, id.as_bytes(), &self.write_opts())
                .map_err(|e| StorageError::Database(e.to_string())),
            None => self
                .inner
                .delete_cf_opt(&cf, KEY_VOTED_FOR, &self.write_opts())
                .map_err(|e| StorageError::Database(e.to_string())),
        }
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<()> {
        for name in cf::ALL {
            let cf = self.handle(name)?;
            self.inner
                .flush_cf(&cf)
                .map_err(|e| StorageError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Path of the underlying database.
    pub fn path(&self) -> &str {
        &self.config.path
    }
}

fn decode_index(key: &[u8]) -> Result<u64> {
    key.try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| StorageError::Codec(format!("log key has {} bytes, expected 8", key.len())))
}

impl Drop for LogStore {
    fn drop(&mut self) {
        debug!(path = %self.config.path, "closing log store");
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "flush on close failed");
        }
    }
}
