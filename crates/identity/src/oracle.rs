//! The proof oracle: the node's current service identity and proof key.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::tree::compute_service_id_hex;
use crate::IdentityError;

/// An atomic snapshot of the node's proof material.
///
/// Both fields are 64 lowercase hex characters. Clients reading the pair
/// must treat the two fields atomically; the oracle never exposes a partial
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSnapshot {
    /// Hex-rendered service identity of the node's service tree.
    pub service_id: String,
    /// Hex-rendered random proof key, rotated independently of the tree.
    pub proof_key_hash: String,
}

/// Holds the current [`ProofSnapshot`] and regenerates its halves on demand.
///
/// The service id half is recomputed by [`ProofOracle::refresh`] whenever the
/// filesystem notifier (an external collaborator) reports a change under the
/// base directory. The proof key half rotates independently via
/// [`ProofOracle::rotate_key`].
pub struct ProofOracle {
    base_dir: PathBuf,
    inner: Mutex<ProofSnapshot>,
}

impl ProofOracle {
    /// Create an oracle for the tree rooted at `base_dir`, computing the
    /// initial service id and generating the first proof key.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let service_id = compute_service_id_hex(&base_dir)?;
        let proof_key_hash = generate_proof_key_hash();
        info!(
            base_dir = %base_dir.display(),
            service_id = %service_id,
            "proof oracle initialized"
        );
        Ok(Self {
            base_dir,
            inner: Mutex::new(ProofSnapshot {
                service_id,
                proof_key_hash,
            }),
        })
    }

    /// Recompute the service id from the base directory and atomically
    /// replace it. The proof key is untouched. Returns the new service id.
    pub fn refresh(&self) -> Result<String, IdentityError> {
        // The tree walk happens outside the lock so readers are never
        // blocked on disk I/O.
        let service_id = compute_service_id_hex(&self.base_dir)?;
        let mut snap = self.inner.lock();
        if snap.service_id != service_id {
            info!(service_id = %service_id, "service identity refreshed");
        }
        snap.service_id = service_id.clone();
        Ok(service_id)
    }

    /// Generate a fresh random proof key and atomically replace the old one.
    /// Returns the new proof-key hash.
    pub fn rotate_key(&self) -> String {
        let proof_key_hash = generate_proof_key_hash();
        self.inner.lock().proof_key_hash = proof_key_hash.clone();
        info!("proof key rotated");
        proof_key_hash
    }

    /// Return the current snapshot as a single atomic pair.
    pub fn snapshot(&self) -> ProofSnapshot {
        self.inner.lock().clone()
    }

    /// The base directory the service id is computed from.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// 32 cryptographically-random bytes, hex encoded.
fn generate_proof_key_hash() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
