//! SHA-256 helpers and the block-hash formula.

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes a block hash, hex encoded.
///
/// ```text
/// block_hash = SHA-256( decimal(index) || prev_hash || ciphertext )
/// ```
///
/// `prev_hash` enters as its hex string, not decoded bytes. The hash covers
/// the ciphertext, so two commits that encrypt to the same bytes at the same
/// position collide.
pub fn compute_block_hash(index: u64, prev_hash: &str, ciphertext: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(ciphertext);
    hex::encode(hasher.finalize())
}
