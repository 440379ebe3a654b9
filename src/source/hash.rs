// src/source/hash.rs

use blake3::Hasher;

/// Hash of a file's contents, as a hex string.
///
/// Dirty checks compare these strings for equality; modification times are
/// never consulted.
pub fn compute_content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
