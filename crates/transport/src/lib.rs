//! # Cirrus Transport
//!
//! Peer transport for the two consensus RPCs and the proof endpoint.
//!
//! - [`HttpPeerClient`] - outbound JSON-over-HTTP client with bounded
//!   retries. Before transmission it fills any empty proof fields from the
//!   [`cirrus_identity::ProofOracle`] and validates the triple; a validation
//!   failure aborts the send locally.
//! - [`RpcServer`] - axum server exposing `POST /requestVote`,
//!   `POST /appendEntries` and `GET /consensus`. Inbound proofs are
//!   validated before the request reaches the consensus engine.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod server;

pub use client::HttpPeerClient;
pub use server::{RpcServer, RpcServerConfig};

use thiserror::Error;

/// Errors from the peer transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),

    /// Binding or serving the RPC listener failed.
    #[error("rpc server error: {0}")]
    Server(String),

    /// Local proof validation rejected the outbound request.
    #[error(transparent)]
    Proof(#[from] cirrus_identity::ProofError),

    /// All attempts against a peer failed.
    #[error("peer {peer} unreachable after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Peer address the request targeted.
        peer: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },
}
