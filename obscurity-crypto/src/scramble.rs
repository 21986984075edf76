//! Scramble codec for 32-byte block hashes.
//!
//! ```text
//! mask    = SHA-256(protocol_tag || version || salt || hash)
//! payload = hash XOR mask
//! ```
//!
//! This is a commitment, not confidentiality: checking a payload needs the
//! hash it claims to encode, since the mask is derived from that hash.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use obscurity_core::constants::{
    BLOCK_HASH_SIZE, SCRAMBLE_PROTOCOL_TAG, SCRAMBLE_SALT_SIZE, SCRAMBLE_VERSION,
};
use obscurity_core::error::{ObscurityError, Result};

/// Scrambled hash and the salt needed to check it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scrambled {
    /// `hash XOR mask`
    pub payload: [u8; BLOCK_HASH_SIZE],
    /// Random salt mixed into the mask
    pub salt: [u8; SCRAMBLE_SALT_SIZE],
}

fn mask(hash: &[u8; BLOCK_HASH_SIZE], salt: &[u8; SCRAMBLE_SALT_SIZE]) -> [u8; BLOCK_HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(SCRAMBLE_PROTOCOL_TAG);
    hasher.update([SCRAMBLE_VERSION]);
    hasher.update(salt);
    hasher.update(hash);
    hasher.finalize().into()
}

/// Scrambles `hash` under a fresh random salt.
pub fn scramble(hash: &[u8; BLOCK_HASH_SIZE]) -> Scrambled {
    let mut salt = [0u8; SCRAMBLE_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    Scrambled {
        payload: scramble_with_salt(hash, &salt),
        salt,
    }
}

/// Scrambles `hash` under a given salt.
pub fn scramble_with_salt(
    hash: &[u8; BLOCK_HASH_SIZE],
    salt: &[u8; SCRAMBLE_SALT_SIZE],
) -> [u8; BLOCK_HASH_SIZE] {
    let m = mask(hash, salt);
    let mut out = [0u8; BLOCK_HASH_SIZE];
    for (o, (h, k)) in out.iter_mut().zip(hash.iter().zip(m.iter())) {
        *o = h ^ k;
    }
    out
}

/// Returns true if `payload` is the scramble of `expected_hash` under `salt`.
///
/// Payloads of the wrong length never match.
pub fn unscramble(
    payload: &[u8],
    salt: &[u8; SCRAMBLE_SALT_SIZE],
    expected_hash: &[u8; BLOCK_HASH_SIZE],
) -> bool {
    if payload.len() != BLOCK_HASH_SIZE {
        return false;
    }
    let recomputed = scramble_with_salt(expected_hash, salt);
    recomputed[..].ct_eq(payload).into()
}

/// Like [`unscramble`], reporting a mismatch as an error.
pub fn verify_scrambled(
    payload: &[u8],
    salt: &[u8; SCRAMBLE_SALT_SIZE],
    expected_hash: &[u8; BLOCK_HASH_SIZE],
) -> Result<()> {
    if unscramble(payload, salt, expected_hash) {
        Ok(())
    } else {
        Err(ObscurityError::ScrambleMismatch {
            expected_hash: hex::encode(expected_hash),
        })
    }
}
