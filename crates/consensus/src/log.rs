//! The replicated log: in-memory view over the durable store.

use std::sync::Arc;

use tracing::debug;

use cirrus_storage::{LogStore, StorageError};
use cirrus_types::{Command, LogEntry};

/// Append-only indexed sequence of entries, beginning with the sentinel at
/// index 0. Every mutation is persisted before it becomes visible.
pub struct ReplicatedLog {
    entries: Vec<LogEntry>,
    store: Arc<LogStore>,
}

impl ReplicatedLog {
    /// Load the log from the store, writing the sentinel into a fresh store.
    pub fn open(store: Arc<LogStore>) -> Result<Self, StorageError> {
        let mut entries = store.load_entries()?;
        if entries.is_empty() {
            let sentinel = LogEntry::sentinel();
            store.put_entry(&sentinel)?;
            entries.push(sentinel);
        }
        debug!(len = entries.len(), "replicated log opened");
        Ok(Self { entries, store })
    }

    /// Append a new command, assigning `index = len` and the given term.
    /// Returns the index of the appended entry.
    pub fn append_command(&mut self, term: u64, command: Command) -> Result<u64, StorageError> {
        let index = self.entries.len() as u64;
        let entry = LogEntry::new(index, term, command);
        self.store.put_entry(&entry)?;
        self.entries.push(entry);
        Ok(index)
    }

    /// Append a replicated entry from the leader. The entry's index must be
    /// exactly `len`, i.e. the caller has already truncated any conflict.
    pub fn append_entry(&mut self, entry: LogEntry) -> Result<(), StorageError> {
        let expected = self.entries.len() as u64;
        if entry.index != expected {
            return Err(StorageError::CorruptEntry {
                index: entry.index,
                message: format!("append out of order, expected index {expected}"),
            });
        }
        self.store.put_entry(&entry)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Discard every entry with index strictly greater than `index`.
    pub fn truncate_after(&mut self, index: u64) -> Result<(), StorageError> {
        if index + 1 >= self.entries.len() as u64 {
            return Ok(());
        }
        self.store.truncate_after(index)?;
        self.entries.truncate((index + 1) as usize);
        debug!(last_index = index, "log truncated");
        Ok(())
    }

    /// Entry at `index`, if present.
    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries.get(index as usize)
    }

    /// The tail slice starting at `from` (cloned for replication).
    pub fn tail_from(&self, from: u64) -> Vec<LogEntry> {
        let from = (from as usize).min(self.entries.len());
        self.entries[from..].to_vec()
    }

    /// Index of the last entry (0 for a log holding only the sentinel).
    pub fn last_index(&self) -> u64 {
        self.entries.len() as u64 - 1
    }

    /// Term of the last entry.
    pub fn last_term(&self) -> u64 {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    /// Number of entries including the sentinel.
    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    /// A log is never empty; it always holds at least the sentinel.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_storage::LogStoreConfig;
    use cirrus_types::ContainerState;
    use tempfile::TempDir;

    fn open_log() -> (ReplicatedLog, Arc<LogStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            LogStore::open(LogStoreConfig {
                path: dir.path().to_string_lossy().to_string(),
                sync_writes: false,
            })
            .unwrap(),
        );
        let log = ReplicatedLog::open(Arc::clone(&store)).unwrap();
        (log, store, dir)
    }

    fn cmd(n: u64) -> Command {
        Command::ContainerStateUpdated(ContainerState::new(format!("c{n}"), "h", 0))
    }

    #[test]
    fn test_fresh_log_has_sentinel() {
        let (log, _store, _dir) = open_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.last_term(), 0);
        assert!(log.get(0).unwrap().is_sentinel());
    }

    #[test]
    fn test_append_assigns_dense_indices() {
        let (mut log, _store, _dir) = open_log();
        assert_eq!(log.append_command(1, cmd(1)).unwrap(), 1);
        assert_eq!(log.append_command(1, cmd(2)).unwrap(), 2);
        assert_eq!(log.append_command(2, cmd(3)).unwrap(), 3);
        assert_eq!(log.last_index(), 3);
        assert_eq!(log.last_term(), 2);
    }

    #[test]
    fn test_terms_monotonic_across_entries() {
        let (mut log, _store, _dir) = open_log();
        log.append_command(1, cmd(1)).unwrap();
        log.append_command(2, cmd(2)).unwrap();
        log.append_command(2, cmd(3)).unwrap();
        for i in 1..=log.last_index() {
            assert!(log.get(i).unwrap().term >= log.get(i - 1).unwrap().term);
        }
    }

    #[test]
    fn test_tail_from() {
        let (mut log, _store, _dir) = open_log();
        for n in 1..=4 {
            log.append_command(1, cmd(n)).unwrap();
        }
        let tail = log.tail_from(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].index, 3);
        assert!(log.tail_from(10).is_empty());
        assert_eq!(log.tail_from(0).len(), 5);
    }

    #[test]
    fn test_truncate_after() {
        let (mut log, _store, _dir) = open_log();
        for n in 1..=4 {
            log.append_command(1, cmd(n)).unwrap();
        }
        log.truncate_after(2).unwrap();
        assert_eq!(log.last_index(), 2);
        assert!(log.get(3).is_none());
        // Appending after truncation reuses the freed indices.
        assert_eq!(log.append_command(2, cmd(9)).unwrap(), 3);
    }

    #[test]
    fn test_append_entry_rejects_gap() {
        let (mut log, _store, _dir) = open_log();
        let far = LogEntry::new(5, 1, cmd(5));
        assert!(log.append_entry(far).is_err());
    }

    #[test]
    fn test_log_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let config = LogStoreConfig {
            path: dir.path().to_string_lossy().to_string(),
            sync_writes: false,
        };
        {
            let store = Arc::new(LogStore::open(config.clone()).unwrap());
            let mut log = ReplicatedLog::open(Arc::clone(&store)).unwrap();
            log.append_command(2, cmd(1)).unwrap();
            log.append_command(2, cmd(2)).unwrap();
        }
        let store = Arc::new(LogStore::open(config).unwrap());
        let log = ReplicatedLog::open(store).unwrap();
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.last_term(), 2);
    }
}
