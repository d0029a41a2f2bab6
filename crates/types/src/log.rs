//! Replicated log entries.

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// An entry in the replicated log.
///
/// Indices are dense and strictly monotonic. The log always begins with a
/// sentinel entry at index 0, term 0 and no command; real entries always
/// carry `Some(command)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log, starting at 0 for the sentinel.
    pub index: u64,
    /// Election term under which the entry was appended.
    pub term: u64,
    /// The replicated command; `None` only for the sentinel.
    pub command: Option<Command>,
}

impl LogEntry {
    /// Create a new entry carrying a command.
    pub fn new(index: u64, term: u64, command: Command) -> Self {
        Self {
            index,
            term,
            command: Some(command),
        }
    }

    /// The sentinel entry every log begins with.
    pub fn sentinel() -> Self {
        Self {
            index: 0,
            term: 0,
            command: None,
        }
    }

    /// Whether this is the sentinel entry.
    pub fn is_sentinel(&self) -> bool {
        self.index == 0 && self.term == 0 && self.command.is_none()
    }
}
