//! Content hashing for sync operations.
//!
//! SHA256 over the canonical serialization of a table gives a fingerprint
//! that changes exactly when the table's logical content changes.

use sha2::{Digest, Sha256};

/// Compute the SHA256 hex digest of a string.
///
/// Used both for whole-table export fingerprints and for per-file content
/// hashes on `IndexedFile`.
#[must_use]
pub fn content_hash_str(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if a table has changed since last export.
///
/// Returns `true` if:
/// - There is no stored hash (never exported)
/// - The current hash differs from the stored hash
///
/// Returns `false` if the hashes match (no change).
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}
