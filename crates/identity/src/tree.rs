//! Deterministic recursive hashing of a service tree.
//!
//! The format is bit-exact and normative:
//!
//! ```text
//! file leaf: SHA-256("FILE" || relpath || size_be8 || raw bytes)
//! directory: SHA-256("DIR"  || relpath || child_count_be8
//!                           || for each sorted child: child_relpath || child_hash)
//! ```
//!
//! Children are sorted by raw file name ascending before hashing, the root
//! directory uses the literal relative path `"."`, and a child of the root
//! has a relative path equal to its file name. Two trees whose relative
//! paths, file sizes and file bytes agree hash to byte-equal identities.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::IdentityError;

/// A 32-byte service identity.
pub type ServiceId = [u8; 32];

/// A single file or directory in the hashed tree.
///
/// Nodes are built in one pass and discarded once the root hash is taken;
/// file contents are never retained after hashing.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Whether this node is a directory.
    pub is_dir: bool,
    /// Path relative to the base directory (`"."` for the root).
    pub rel_path: String,
    /// The node's 32-byte hash.
    pub hash: ServiceId,
    /// Byte size (files only; 0 for directories).
    pub size: u64,
    /// Child nodes, sorted by raw file name (directories only).
    pub children: Vec<TreeNode>,
}

/// Compute the service identity of the tree rooted at `base_dir`.
///
/// Symbolic links are followed; a link cycle or an unreadable entry
/// therefore surfaces as an I/O error.
pub fn compute_service_id(base_dir: impl AsRef<Path>) -> Result<ServiceId, IdentityError> {
    Ok(build_root(base_dir.as_ref())?.hash)
}

/// Compute the service identity rendered as 64 lowercase hex characters.
pub fn compute_service_id_hex(base_dir: impl AsRef<Path>) -> Result<String, IdentityError> {
    compute_service_id(base_dir).map(hex::encode)
}

/// Build the full [`TreeNode`] for the tree rooted at `base_dir`.
pub fn build_root(base_dir: &Path) -> Result<TreeNode, IdentityError> {
    let meta = fs::metadata(base_dir).map_err(|source| IdentityError::Io {
        path: base_dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(IdentityError::NotADirectory(base_dir.to_path_buf()));
    }
    let root = build_node(base_dir, ".")?;
    debug!(
        base_dir = %base_dir.display(),
        service_id = %hex::encode(root.hash),
        "computed service identity"
    );
    Ok(root)
}

fn build_node(abs_path: &Path, rel_path: &str) -> Result<TreeNode, IdentityError> {
    // fs::metadata follows symlinks, matching the documented behavior.
    let meta = fs::metadata(abs_path).map_err(|source| IdentityError::Io {
        path: abs_path.to_path_buf(),
        source,
    })?;

    if meta.is_dir() {
        let mut names = Vec::new();
        let read_dir = fs::read_dir(abs_path).map_err(|source| IdentityError::Io {
            path: abs_path.to_path_buf(),
            source,
        })?;
        for entry in read_dir {
            let entry = entry.map_err(|source| IdentityError::Io {
                path: abs_path.to_path_buf(),
                source,
            })?;
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| IdentityError::NonUnicodeName(abs_path.to_path_buf()))?;
            names.push(name);
        }
        // Raw byte order of the file names keeps the hash stable across
        // platforms and locales.
        names.sort_unstable();

        let mut children = Vec::with_capacity(names.len());
        for name in &names {
            let child_abs = abs_path.join(name);
            let child_rel = join_rel(rel_path, name);
            children.push(build_node(&child_abs, &child_rel)?);
        }

        let hash = hash_directory(rel_path, &children);
        Ok(TreeNode {
            is_dir: true,
            rel_path: rel_path.to_string(),
            hash,
            size: 0,
            children,
        })
    } else {
        let data = fs::read(abs_path).map_err(|source| IdentityError::Io {
            path: abs_path.to_path_buf(),
            source,
        })?;
        let size = data.len() as u64;
        let hash = hash_file(rel_path, size, &data);
        Ok(TreeNode {
            is_dir: false,
            rel_path: rel_path.to_string(),
            hash,
            size,
            children: Vec::new(),
        })
    }
}

/// Join a parent relative path with a child name. A child of the root `"."`
/// takes its bare name.
fn join_rel(parent: &str, name: &str) -> String {
    if parent == "." {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn hash_file(rel_path: &str, size: u64, data: &[u8]) -> ServiceId {
    let mut hasher = Sha256::new();
    hasher.update(b"FILE");
    hasher.update(rel_path.as_bytes());
    hasher.update(size.to_be_bytes());
    hasher.update(data);
    hasher.finalize().into()
}

fn hash_directory(rel_path: &str, children: &[TreeNode]) -> ServiceId {
    let mut hasher = Sha256::new();
    hasher.update(b"DIR");
    hasher.update(rel_path.as_bytes());
    hasher.update((children.len() as u64).to_be_bytes());
    for child in children {
        hasher.update(child.rel_path.as_bytes());
        hasher.update(child.hash);
    }
    hasher.finalize().into()
}
