//! Combining and validating consensus proofs.
//!
//! A proof triple is `(service_id, proof_key_hash, combined_proof)` where the
//! combined proof is the SHA-256 of the ASCII concatenation of the two hex
//! strings, rendered lowercase hex. Both pure functions here are free of any
//! node state; the transport composes them with the [`crate::ProofOracle`].

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised when a proof triple fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// The service id is not 64 hex characters.
    #[error("invalid service id: must be 64 hex chars")]
    InvalidServiceId,

    /// The proof-key hash is not 64 hex characters.
    #[error("invalid proof key hash: must be 64 hex chars")]
    InvalidProofKeyHash,

    /// The combined proof does not match the recomputed combination.
    #[error("combined proof mismatch")]
    Mismatch,
}

/// Combine a service id and proof-key hash into a combined proof.
///
/// `SHA-256(service_id_hex || proof_key_hash_hex)` rendered as 64 lowercase
/// hex characters.
pub fn combine_proof(service_id: &str, proof_key_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service_id.as_bytes());
    hasher.update(proof_key_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate a proof triple.
///
/// Rejects when either hex field is not 64 hex characters or when the
/// combined proof does not equal [`combine_proof`] of the pair.
pub fn validate_proof(
    service_id: &str,
    proof_key_hash: &str,
    combined_proof: &str,
) -> Result<(), ProofError> {
    if !is_hex64(service_id) {
        return Err(ProofError::InvalidServiceId);
    }
    if !is_hex64(proof_key_hash) {
        return Err(ProofError::InvalidProofKeyHash);
    }
    if combined_proof != combine_proof(service_id, proof_key_hash) {
        return Err(ProofError::Mismatch);
    }
    Ok(())
}

fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_pair_validates() {
        let sid = "a".repeat(64);
        let pkh = "b".repeat(64);

        // Independently spelled-out expectation.
        let mut hasher = Sha256::new();
        hasher.update(sid.as_bytes());
        hasher.update(pkh.as_bytes());
        let expected = hex::encode(hasher.finalize());

        let combined = combine_proof(&sid, &pkh);
        assert_eq!(combined, expected);
        assert!(validate_proof(&sid, &pkh, &combined).is_ok());
    }

    #[test]
    fn test_flipped_combined_proof_fails() {
        let sid = "a".repeat(64);
        let pkh = "b".repeat(64);
        let combined = combine_proof(&sid, &pkh);

        let mut bytes = combined.into_bytes();
        bytes[0] = if bytes[0] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(
            validate_proof(&sid, &pkh, &tampered),
            Err(ProofError::Mismatch)
        );
    }

    #[test]
    fn test_any_altered_field_fails() {
        let sid = "a".repeat(64);
        let pkh = "b".repeat(64);
        let combined = combine_proof(&sid, &pkh);

        let other_sid = "c".repeat(64);
        let other_pkh = "d".repeat(64);
        assert!(validate_proof(&other_sid, &pkh, &combined).is_err());
        assert!(validate_proof(&sid, &other_pkh, &combined).is_err());
    }

    #[test]
    fn test_field_length_checks() {
        let combined = combine_proof("short", "also-short");
        assert_eq!(
            validate_proof("short", &"b".repeat(64), &combined),
            Err(ProofError::InvalidServiceId)
        );
        assert_eq!(
            validate_proof(&"a".repeat(64), "also-short", &combined),
            Err(ProofError::InvalidProofKeyHash)
        );
    }

    #[test]
    fn test_non_hex_rejected() {
        let zz = "z".repeat(64);
        let pkh = "b".repeat(64);
        let combined = combine_proof(&zz, &pkh);
        assert_eq!(
            validate_proof(&zz, &pkh, &combined),
            Err(ProofError::InvalidServiceId)
        );
    }
}
