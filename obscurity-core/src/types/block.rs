//! Committed blocks.
//!
//! A block records one payload committed to a local chain: its header
//! (position and lifecycle), what the payload was, how it was encrypted, and
//! the keys it was ground into.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::STEGO_ENGINE;
use crate::error::{ObscurityError, Result};
use crate::types::{Difficulty, EmbedScheme, EncryptedPayload, PayloadKind};

/// Lifecycle of a block.
///
/// ```text
/// unlinked --grind--> ready_to_link --txid--> linked --verify--> verified
///                          \_____________________verify_______/
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// Committed locally, no keys yet
    Unlinked,
    /// All keys ground, waiting to be broadcast and found
    ReadyToLink,
    /// A candidate transaction id has been attached
    Linked,
    /// Reconstructed from chain data and authenticated
    Verified,
}

impl BlockStatus {
    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(self, next: BlockStatus) -> bool {
        use BlockStatus::*;
        matches!(
            (self, next),
            (Unlinked, ReadyToLink)
                | (ReadyToLink, Linked)
                | (ReadyToLink, Verified)
                | (Linked, Verified)
                | (Linked, ReadyToLink)
        )
    }

    /// Returns true if the block is ground but not yet confirmed on chain.
    pub fn is_awaiting_chain(self) -> bool {
        matches!(self, BlockStatus::ReadyToLink | BlockStatus::Linked)
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockStatus::Unlinked => "unlinked",
            BlockStatus::ReadyToLink => "ready_to_link",
            BlockStatus::Linked => "linked",
            BlockStatus::Verified => "verified",
        };
        f.write_str(s)
    }
}

/// Block header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain this block belongs to
    pub chain_id: String,
    /// Position in the chain, 0 for the anchor
    pub index: u64,
    /// True for index 0
    pub is_anchor: bool,
    /// SHA-256 over (index, prev_hash, ciphertext), hex
    pub block_hash: String,
    /// Hash of the previous block, hex
    pub prev_hash: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Lifecycle status
    pub status: BlockStatus,
    /// Transaction carrying the keys, once known
    pub txid: Option<String>,
}

/// What was committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Text or file-hash payload
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    /// Name the payload was committed under
    pub original_filename: String,
    /// Size of the user's original bytes
    pub size_bytes: u64,
    /// SHA-256 of the user's original bytes, hex
    pub content_hash_sha256: String,
    /// Human-readable preview
    pub preview: String,
}

/// Grinding state of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StegoStatus {
    /// No keys yet
    Pending,
    /// Every chunk has a key
    Complete,
}

/// How a block is encoded into keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StegoRecord {
    /// Key-search engine label
    pub engine: String,
    /// Grinding state
    pub status: StegoStatus,
    /// Difficulty the keys were ground at
    #[serde(rename = "difficulty_bits", default)]
    pub difficulty: Option<Difficulty>,
    /// Number of keys
    #[serde(default)]
    pub total_chunks: usize,
    /// Which bytes are embedded
    #[serde(default)]
    pub scheme: EmbedScheme,
    /// Compressed public keys in chunk order, hex
    #[serde(default)]
    pub keys: Vec<String>,
}

impl StegoRecord {
    /// A record for a block that has not been ground yet.
    pub fn pending(scheme: EmbedScheme) -> Self {
        Self {
            engine: STEGO_ENGINE.to_string(),
            status: StegoStatus::Pending,
            difficulty: None,
            total_chunks: 0,
            scheme,
            keys: Vec::new(),
        }
    }
}

/// A committed block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position and lifecycle
    pub header: BlockHeader,
    /// What was committed
    pub content: ContentRecord,
    /// Cipher codec output
    pub encryption: EncryptedPayload,
    /// Key encoding
    pub steganography: StegoRecord,
}

impl Block {
    /// Chain id.
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Index within the chain.
    pub fn index(&self) -> u64 {
        self.header.index
    }

    /// Current status.
    pub fn status(&self) -> BlockStatus {
        self.header.status
    }

    /// First ground key, used to spot the block's transaction on chain.
    pub fn first_key(&self) -> Option<&str> {
        self.steganography.keys.first().map(String::as_str)
    }

    /// File name used by file-backed stores: `<index:05>_<hash8>.json`.
    pub fn file_name(&self) -> String {
        let short = self.header.block_hash.get(..8).unwrap_or(&self.header.block_hash);
        format!("{:05}_{}.json", self.header.index, short)
    }

    /// Records a completed grind and moves the block to `ready_to_link`.
    pub fn record_keys(&mut self, difficulty: Difficulty, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            return Err(ObscurityError::ValidationError("no keys to record".into()));
        }
        self.apply_transition(BlockStatus::ReadyToLink)?;
        self.steganography.status = StegoStatus::Complete;
        self.steganography.difficulty = Some(difficulty);
        self.steganography.total_chunks = keys.len();
        self.steganography.keys = keys;
        Ok(())
    }

    /// Moves the header to `next`, refusing illegal transitions.
    pub fn apply_transition(&mut self, next: BlockStatus) -> Result<()> {
        if !self.header.status.can_transition_to(next) {
            return Err(ObscurityError::InvalidTransition {
                index: self.header.index,
                from: self.header.status.to_string(),
                to: next.to_string(),
            });
        }
        self.header.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block() -> Block {
        Block {
            header: BlockHeader {
                chain_id: "a1b2c3d4".into(),
                index: 3,
                is_anchor: false,
                block_hash: "deadbeefcafebabe".into(),
                prev_hash: "00".into(),
                timestamp: Utc::now(),
                status: BlockStatus::Unlinked,
                txid: None,
            },
            content: ContentRecord {
                kind: PayloadKind::Text,
                original_filename: "msg.txt".into(),
                size_bytes: 5,
                content_hash_sha256: "00".into(),
                preview: "hello".into(),
            },
            encryption: EncryptedPayload::new(vec![1, 2, 3, 4, 5], [0u8; 12], [0u8; 16], "a1b2c3d4"),
            steganography: StegoRecord::pending(EmbedScheme::Ciphertext),
        }
    }

    #[test]
    fn test_status_transitions() {
        use BlockStatus::*;
        assert!(Unlinked.can_transition_to(ReadyToLink));
        assert!(ReadyToLink.can_transition_to(Verified));
        assert!(Linked.can_transition_to(Verified));
        assert!(!Unlinked.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(ReadyToLink));
        assert!(!Verified.can_transition_to(Verified));
    }

    #[test]
    fn test_record_keys() {
        let mut block = make_block();
        let d = Difficulty::new(32).unwrap();
        block.record_keys(d, vec!["02aa".into(), "03bb".into()]).unwrap();

        assert_eq!(block.status(), BlockStatus::ReadyToLink);
        assert_eq!(block.steganography.status, StegoStatus::Complete);
        assert_eq!(block.steganography.total_chunks, 2);
        assert_eq!(block.first_key(), Some("02aa"));

        // A second grind over a ground block is refused
        assert!(block.record_keys(d, vec!["02cc".into()]).is_err());
    }

    #[test]
    fn test_record_keys_rejects_empty() {
        let mut block = make_block();
        assert!(block.record_keys(Difficulty::default(), vec![]).is_err());
        assert_eq!(block.status(), BlockStatus::Unlinked);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(make_block().file_name(), "00003_deadbeef.json");
    }

    #[test]
    fn test_block_json_shape() {
        let json = serde_json::to_value(make_block()).unwrap();
        assert_eq!(json["header"]["status"], "unlinked");
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["steganography"]["status"], "pending");
        assert!(json["steganography"]["difficulty_bits"].is_null());

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back.index(), 3);
    }
}
