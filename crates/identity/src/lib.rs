//! # Cirrus Identity
//!
//! Service-identity fingerprinting and consensus proofs.
//!
//! Every Cirrus node derives a 32-byte *service identity* from its own
//! on-disk service tree and pairs it with a random *proof-key hash*. The
//! pair, and a SHA-256 combination of the two, travel on every consensus RPC
//! and are validated on both send and receive.
//!
//! - [`tree`] - deterministic recursive hash over a directory tree
//! - [`oracle`] - holds the current `(service_id, proof_key_hash)` snapshot
//! - [`proof`] - combines and validates proof triples
//!
//! ## Example
//!
//! ```rust,ignore
//! use cirrus_identity::{combine_proof, validate_proof, ProofOracle};
//!
//! let oracle = ProofOracle::new("./service-tree")?;
//! let snap = oracle.snapshot();
//! let combined = combine_proof(&snap.service_id, &snap.proof_key_hash);
//! validate_proof(&snap.service_id, &snap.proof_key_hash, &combined)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod oracle;
pub mod proof;
pub mod tree;

pub use oracle::{ProofOracle, ProofSnapshot};
pub use proof::{combine_proof, validate_proof, ProofError};
pub use tree::{compute_service_id, compute_service_id_hex, ServiceId, TreeNode};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while computing a service identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Reading a directory entry or file failed. Permission problems are
    /// reported here, never silently skipped.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the entry that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The base path given to the hasher is not a directory.
    #[error("base path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An entry's file name is not valid Unicode and cannot take part in the
    /// byte-exact hash format.
    #[error("non-unicode file name under {0}")]
    NonUnicodeName(PathBuf),
}
