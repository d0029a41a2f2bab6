//! Integration tests for the log store.

use cirrus_storage::{LogStore, LogStoreConfig};
use cirrus_types::{Command, ContainerState, LogEntry};
use tempfile::TempDir;

fn create_test_store() -> (LogStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = LogStoreConfig {
        path: temp_dir.path().to_string_lossy().to_string(),
        sync_writes: false, // faster for tests
    };
    let store = LogStore::open(config).unwrap();
    (store, temp_dir)
}

fn entry(index: u64, term: u64) -> LogEntry {
    LogEntry::new(
        index,
        term,
        Command::ContainerStateUpdated(ContainerState::new(
            format!("container-{index}"),
            "hash",
            1_700_000_000,
        )),
    )
}

#[test]
fn test_open_store() {
    let (_store, _temp_dir) = create_test_store();
}

#[test]
fn test_fresh_store_has_empty_state() {
    let (store, _temp_dir) = create_test_store();
    assert_eq!(store.current_term().unwrap(), 0);
    assert_eq!(store.voted_for().unwrap(), None);
    assert!(store.load_entries().unwrap().is_empty());
}

#[test]
fn test_entries_load_in_index_order() {
    let (store, _temp_dir) = create_test_store();

    store.put_entry(&LogEntry::sentinel()).unwrap();
    for i in 1..=300u64 {
        store.put_entry(&entry(i, 1)).unwrap();
    }

    let entries = store.load_entries().unwrap();
    assert_eq!(entries.len(), 301);
    for (i, e) in entries.iter().enumerate() {
        assert_eq!(e.index, i as u64);
    }
}

#[test]
fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = LogStoreConfig {
        path: temp_dir.path().to_string_lossy().to_string(),
        sync_writes: false,
    };

    {
        let store = LogStore::open(config.clone()).unwrap();
        store.put_entry(&LogEntry::sentinel()).unwrap();
        store.put_entry(&entry(1, 3)).unwrap();
        store.set_current_term(3).unwrap();
        store.set_voted_for(Some("node-a")).unwrap();
    }

    let store = LogStore::open(config).unwrap();
    let entries = store.load_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].term, 3);
    assert_eq!(store.current_term().unwrap(), 3);
    assert_eq!(store.voted_for().unwrap(), Some("node-a".to_string()));
}

#[test]
fn test_truncate_after() {
    let (store, _temp_dir) = create_test_store();

    store.put_entry(&LogEntry::sentinel()).unwrap();
    for i in 1..=5u64 {
        store.put_entry(&entry(i, 1)).unwrap();
    }

    store.truncate_after(2).unwrap();

    let entries = store.load_entries().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.last().unwrap().index, 2);
}

#[test]
fn test_truncate_after_last_is_noop() {
    let (store, _temp_dir) = create_test_store();
    store.put_entry(&LogEntry::sentinel()).unwrap();
    store.put_entry(&entry(1, 1)).unwrap();

    store.truncate_after(1).unwrap();
    assert_eq!(store.load_entries().unwrap().len(), 2);
}

#[test]
fn test_overwrite_entry_at_index() {
    let (store, _temp_dir) = create_test_store();
    store.put_entry(&entry(1, 1)).unwrap();
    store.put_entry(&entry(1, 2)).unwrap();

    let entries = store.load_entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].term, 2);
}

#[test]
fn test_voted_for_can_be_cleared() {
    let (store, _temp_dir) = create_test_store();
    store.set_voted_for(Some("node-b")).unwrap();
    assert_eq!(store.voted_for().unwrap(), Some("node-b".to_string()));
    store.set_voted_for(None).unwrap();
    assert_eq!(store.voted_for().unwrap(), None);
}
