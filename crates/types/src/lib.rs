//! # Cirrus Types
//!
//! Core type definitions for the Cirrus cluster node.
//!
//! This crate provides the fundamental types shared across the workspace:
//! - [`LogEntry`] and [`Command`] - the replicated log's data model
//! - [`Job`] and [`JobStatus`] - cluster job records and their state machine
//! - [`NetworkDescriptor`] and [`ContainerState`] - domain effects applied
//!   from committed log entries
//!
//! All wire-visible types serialize with `serde` to the JSON field names used
//! by the peer protocol.
//!
//! ## Example
//!
//! ```rust
//! use cirrus_types::{Command, Job, JobStatus, LogEntry};
//!
//! let job = Job::new("job-1", "Render", "payload", "issuer", "lic-1", "node-b");
//! assert_eq!(job.status, JobStatus::Queued);
//!
//! let entry = LogEntry::new(1, 1, Command::JobPosted(job));
//! assert!(!entry.is_sentinel());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod command;
pub mod job;
pub mod log;

// Re-export main types at crate root
pub use command::{Command, ContainerState, NetworkDescriptor};
pub use job::{Job, JobStatus};
pub use log::LogEntry;

/// Opaque identifier of a cluster member, unique per cluster.
pub type NodeId = String;

/// Contactable network location of a peer (e.g. `http://10.0.0.2:3001`).
pub type PeerAddress = String;
