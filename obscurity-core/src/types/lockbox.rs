//! Lockbox artifacts.
//!
//! A lockbox bundles everything needed to decode a committed block once its
//! keys are on chain: the ordered public keys, the encryption parameters and
//! the block hash the payload commits to.

use serde::{Deserialize, Serialize};

use crate::constants::{BLOCK_HASH_SIZE, COMPRESSED_PUBKEY_SIZE, LOCKBOX_VERSION};
use crate::error::{ObscurityError, Result};
use crate::types::{Block, Difficulty, EmbedScheme, EncryptedPayload};

/// Ready-to-broadcast encoding of one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockbox {
    /// Format version
    pub version: u32,
    /// Chain the block belongs to
    pub chain_id: String,
    /// Index of the block within its chain
    pub block_index: u64,
    /// Block hash, hex
    pub target_hash: String,
    /// Difficulty the keys were ground at
    #[serde(rename = "difficulty_bits")]
    pub difficulty: Difficulty,
    /// Which bytes the keys embed
    #[serde(default)]
    pub scheme: EmbedScheme,
    /// Encryption parameters
    pub encryption: EncryptedPayload,
    /// Compressed public keys in chunk order, hex
    pub keys: Vec<String>,
}

impl Lockbox {
    /// Builds the lockbox for a fully ground block.
    pub fn from_block(block: &Block) -> Result<Self> {
        let difficulty = block.steganography.difficulty.ok_or_else(|| {
            ObscurityError::ValidationError(format!(
                "block {} of chain {} has not been ground",
                block.index(),
                block.chain_id()
            ))
        })?;

        let lockbox = Self {
            version: LOCKBOX_VERSION,
            chain_id: block.header.chain_id.clone(),
            block_index: block.header.index,
            target_hash: block.header.block_hash.clone(),
            difficulty,
            scheme: block.steganography.scheme,
            encryption: block.encryption.clone(),
            keys: block.steganography.keys.clone(),
        };
        lockbox.validate()?;
        Ok(lockbox)
    }

    /// Checks version, key encoding and key count.
    pub fn validate(&self) -> Result<()> {
        if self.version != LOCKBOX_VERSION {
            return Err(ObscurityError::VersionMismatch {
                expected: LOCKBOX_VERSION,
                actual: self.version,
            });
        }
        self.encryption.validate()?;

        if self.keys.is_empty() {
            return Err(ObscurityError::ValidationError("lockbox holds no keys".into()));
        }
        for key in &self.keys {
            let bytes = hex::decode(key)?;
            if bytes.len() != COMPRESSED_PUBKEY_SIZE || !matches!(bytes[0], 0x02 | 0x03) {
                return Err(ObscurityError::InvalidPublicKey(key.clone()));
            }
        }

        let needed = self.expected_len().div_ceil(self.difficulty.chunk_bytes());
        if self.keys.len() != needed {
            return Err(ObscurityError::ValidationError(format!(
                "lockbox holds {} keys, payload needs {}",
                self.keys.len(),
                needed
            )));
        }
        Ok(())
    }

    /// Number of embedded bytes the keys reconstruct to.
    pub fn expected_len(&self) -> usize {
        match self.scheme {
            EmbedScheme::Ciphertext => self.encryption.ciphertext.len(),
            EmbedScheme::ScrambledHash { .. } => BLOCK_HASH_SIZE,
        }
    }

    /// First key, the pending-index lookup value.
    pub fn first_key(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }

    /// File name used by file-backed stores: `<chain_id>_blk<index>.lockbox`.
    pub fn file_name(&self) -> String {
        lockbox_file_name(&self.chain_id, self.block_index)
    }
}

/// Lockbox file name for a block.
pub fn lockbox_file_name(chain_id: &str, block_index: u64) -> String {
    format!("{}_blk{}.lockbox", chain_id, block_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, BlockStatus, ContentRecord, PayloadKind, StegoRecord};
    use chrono::Utc;

    fn ground_block(ciphertext_len: usize, keys: usize) -> Block {
        let mut block = Block {
            header: BlockHeader {
                chain_id: "a1b2c3d4".into(),
                index: 1,
                is_anchor: false,
                block_hash: "ab".repeat(32),
                prev_hash: "00".repeat(32),
                timestamp: Utc::now(),
                status: BlockStatus::Unlinked,
                txid: None,
            },
            content: ContentRecord {
                kind: PayloadKind::Text,
                original_filename: "msg.txt".into(),
                size_bytes: ciphertext_len as u64,
                content_hash_sha256: "00".repeat(32),
                preview: String::new(),
            },
            encryption: EncryptedPayload::new(vec![7u8; ciphertext_len], [0; 12], [0; 16], "a1b2c3d4"),
            steganography: StegoRecord::pending(EmbedScheme::Ciphertext),
        };
        let key = format!("02{}", "11".repeat(32));
        block
            .record_keys(Difficulty::new(32).unwrap(), vec![key; keys])
            .unwrap();
        block
    }

    #[test]
    fn test_from_block() {
        let lockbox = Lockbox::from_block(&ground_block(5, 2)).unwrap();
        assert_eq!(lockbox.version, LOCKBOX_VERSION);
        assert_eq!(lockbox.block_index, 1);
        assert_eq!(lockbox.expected_len(), 5);
        assert_eq!(lockbox.file_name(), "a1b2c3d4_blk1.lockbox");
    }

    #[test]
    fn test_rejects_wrong_key_count() {
        assert!(Lockbox::from_block(&ground_block(5, 1)).is_err());
        assert!(Lockbox::from_block(&ground_block(5, 3)).is_err());
    }

    #[test]
    fn test_rejects_ungrounded_block() {
        let mut block = ground_block(5, 2);
        block.steganography.difficulty = None;
        assert!(Lockbox::from_block(&block).is_err());
    }

    #[test]
    fn test_rejects_bad_key_and_version() {
        let mut lockbox = Lockbox::from_block(&ground_block(5, 2)).unwrap();
        lockbox.keys[1] = format!("04{}", "11".repeat(32));
        assert!(matches!(lockbox.validate(), Err(ObscurityError::InvalidPublicKey(_))));

        let mut lockbox = Lockbox::from_block(&ground_block(5, 2)).unwrap();
        lockbox.version = 9;
        assert!(matches!(
            lockbox.validate(),
            Err(ObscurityError::VersionMismatch { actual: 9, .. })
        ));
    }

    #[test]
    fn test_scrambled_expected_len() {
        let mut block = ground_block(100, 8);
        block.steganography.scheme = EmbedScheme::ScrambledHash { salt: [1, 2, 3, 4] };
        let lockbox = Lockbox::from_block(&block).unwrap();
        assert_eq!(lockbox.expected_len(), BLOCK_HASH_SIZE);
    }

    #[test]
    fn test_json_field_names() {
        let lockbox = Lockbox::from_block(&ground_block(5, 2)).unwrap();
        let json = serde_json::to_value(&lockbox).unwrap();
        assert_eq!(json["difficulty_bits"], 32);
        assert_eq!(json["encryption"]["key_used"], "a1b2c3d4");
        assert_eq!(json["keys"].as_array().unwrap().len(), 2);
    }
}
