//! Grind targets, results and progress reports.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{COMPRESSED_PUBKEY_SIZE, MIN_TARGET_HEX_LEN};
use crate::error::{ObscurityError, Result};

/// One chunk awaiting a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrindTarget {
    /// Position of the chunk in its plan
    pub chunk_index: usize,
    /// Bytes the key's X coordinate must start with
    pub chunk: Vec<u8>,
}

impl GrindTarget {
    /// Creates a target for a chunk.
    pub fn new(chunk_index: usize, chunk: Vec<u8>) -> Self {
        Self { chunk_index, chunk }
    }

    /// Wire form sent to a key-search process.
    ///
    /// Hex of the chunk, right-padded with `'0'` to at least 8 characters.
    pub fn as_hex(&self) -> String {
        let mut hex = hex::encode(&self.chunk);
        let width = (self.chunk.len() * 2).max(MIN_TARGET_HEX_LEN);
        while hex.len() < width {
            hex.push('0');
        }
        hex
    }

    /// Returns true if `public_key` is a compressed key whose X coordinate
    /// starts with this chunk.
    pub fn matches_public_key(&self, public_key: &[u8]) -> bool {
        public_key.len() == COMPRESSED_PUBKEY_SIZE
            && matches!(public_key[0], 0x02 | 0x03)
            && public_key[1..].starts_with(&self.chunk)
    }
}

/// A key reported by a searcher, before it is tied to a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundKey {
    /// Private key, hex
    pub private_key: String,
    /// Compressed public key, hex
    pub public_key: String,
    /// Keys tried before this one was found
    pub attempts: u64,
}

/// A ground key for one chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrindResult {
    /// Chunk this key encodes
    pub chunk_index: usize,
    /// Private key, hex
    pub private_key: String,
    /// Compressed public key, hex
    pub public_key: String,
    /// Keys tried before this one was found
    pub attempts: u64,
}

impl GrindResult {
    /// Ties a found key to its chunk.
    pub fn from_found(chunk_index: usize, found: FoundKey) -> Self {
        Self {
            chunk_index,
            private_key: found.private_key,
            public_key: found.public_key,
            attempts: found.attempts,
        }
    }

    /// Decoded public key bytes.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.public_key)?)
    }

    /// Fails unless the public key carries the target's chunk as its prefix.
    pub fn verify_against(&self, target: &GrindTarget) -> Result<()> {
        let matches = self
            .public_key_bytes()
            .map(|pk| target.matches_public_key(&pk))
            .unwrap_or(false);
        if self.chunk_index != target.chunk_index || !matches {
            return Err(ObscurityError::PrefixMismatch {
                chunk_index: target.chunk_index,
                target: target.as_hex(),
            });
        }
        Ok(())
    }
}

/// Progress notification fired once per ground chunk.
#[derive(Clone, Debug)]
pub struct GrindProgress {
    /// Worker that found the key
    pub worker_id: usize,
    /// Chunk the key encodes
    pub chunk_index: usize,
    /// Compressed public key, hex
    pub public_key: String,
    /// Keys tried for this chunk
    pub attempts: u64,
    /// Time the worker spent on this chunk
    pub elapsed: Duration,
    /// Chunks ground so far across all workers
    pub completed: usize,
    /// Chunks in the plan
    pub total: usize,
}

impl GrindProgress {
    /// Keys tried per second for this chunk.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

/// Callback for grind progress updates.
pub type GrindProgressCallback = Arc<dyn Fn(GrindProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(vec![0x68], "68000000" ; "one byte padded")]
    #[test_case(vec![0x68, 0x65, 0x6c, 0x6c], "68656c6c" ; "four bytes exact")]
    #[test_case(vec![0xab; 8], "abababababababab" ; "eight bytes wider than minimum")]
    fn test_target_hex(chunk: Vec<u8>, expected: &str) {
        assert_eq!(GrindTarget::new(0, chunk).as_hex(), expected);
    }

    fn pubkey(prefix: u8, x_start: &[u8]) -> Vec<u8> {
        let mut pk = vec![prefix];
        pk.extend_from_slice(x_start);
        pk.resize(COMPRESSED_PUBKEY_SIZE, 0x55);
        pk
    }

    #[test]
    fn test_matches_public_key() {
        let target = GrindTarget::new(0, vec![0xde, 0xad]);
        assert!(target.matches_public_key(&pubkey(0x02, &[0xde, 0xad])));
        assert!(target.matches_public_key(&pubkey(0x03, &[0xde, 0xad, 0x01])));
        assert!(!target.matches_public_key(&pubkey(0x04, &[0xde, 0xad])));
        assert!(!target.matches_public_key(&pubkey(0x02, &[0xde, 0xae])));
        assert!(!target.matches_public_key(&[0x02, 0xde, 0xad]));
    }

    #[test]
    fn test_verify_against() {
        let target = GrindTarget::new(3, vec![0xca, 0xfe]);
        let good = GrindResult {
            chunk_index: 3,
            private_key: "00".into(),
            public_key: hex::encode(pubkey(0x02, &[0xca, 0xfe])),
            attempts: 10,
        };
        assert!(good.verify_against(&target).is_ok());

        let wrong_index = GrindResult { chunk_index: 4, ..good.clone() };
        assert!(wrong_index.verify_against(&target).is_err());

        let garbage = GrindResult { public_key: "zz".into(), ..good };
        assert!(matches!(
            garbage.verify_against(&target),
            Err(ObscurityError::PrefixMismatch { chunk_index: 3, .. })
        ));
    }

    #[test]
    fn test_progress_rate() {
        let mut progress = GrindProgress {
            worker_id: 0,
            chunk_index: 0,
            public_key: String::new(),
            attempts: 1000,
            elapsed: Duration::from_millis(500),
            completed: 1,
            total: 2,
        };
        assert!((progress.rate() - 2000.0).abs() < 1e-6);
        progress.elapsed = Duration::ZERO;
        assert_eq!(progress.rate(), 0.0);
    }
}
