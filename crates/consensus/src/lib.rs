//! # Cirrus Consensus
//!
//! Leader-based replicated-state-machine core of a Cirrus node.
//!
//! The engine keeps a durable append-only log of [`cirrus_types::Command`]s,
//! elects a leader with randomized election timers, replicates the log over
//! the peer transport, and applies committed entries to the node's job,
//! network and container state.
//!
//! ## Consensus flow
//!
//! ```text
//! ┌──────────┐ election timeout ┌───────────┐ majority votes ┌─────────┐
//! │ Follower ├─────────────────►│ Candidate ├───────────────►│ Leader  │
//! └────▲─────┘                  └─────┬─────┘                └────┬────┘
//!      │        higher term observed  │  timer elapses:           │
//!      └──────────────────────────────┴──── new election ◄────────┘
//!
//! Leader, every heartbeat tick:
//!   for each peer p: AppendEntries(log[next_index[p]..])
//!   on success: match_index[p] advances; commit when a majority holds an
//!   index appended in the current term; apply in strict index order.
//! ```
//!
//! Every outbound RPC carries the node's service-identity proof; the
//! transport layer fills and validates it before anything reaches a peer.
//!
//! ## Locking discipline
//!
//! All shared state lives behind one per-node mutex. No RPC is ever awaited
//! while the mutex is held: loops snapshot what they need, release the lock,
//! then transmit.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod applier;
pub mod engine;
pub mod jobs;
pub mod log;
pub mod types;

pub use applier::{AppliedState, CommandApplier, ExternalEffect, LicenseIssuer};
pub use engine::{
    ConsensusError, NodeState, PeerClient, PeerError, RaftEngine, RaftRpc, RaftStatus,
};
pub use jobs::JobStore;
pub use log::ReplicatedLog;
pub use types::{
    AppendEntriesRequest, AppendEntriesResponse, RaftTiming, Role, VoteRequest, VoteResponse,
};
