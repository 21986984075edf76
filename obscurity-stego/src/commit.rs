//! Block commit factory.
//!
//! Turns a user payload into a new, unground block: encrypt, hash, and pick
//! the bytes that will later be ground into keys.

use chrono::Utc;
use tracing::{debug, info};

use obscurity_core::constants::BLOCK_HASH_SIZE;
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::{
    Block, BlockHeader, BlockStatus, ContentRecord, EmbedScheme, PayloadKind, StegoRecord,
};
use obscurity_crypto::{compute_block_hash, encrypt, scramble, scramble_with_salt, sha256, sha256_hex};

// ═══════════════════════════════════════════════════════════════════════════════
// INPUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Bytes a user wants committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// Name the payload is recorded under
    pub filename: String,
    /// What gets encrypted
    pub kind: PayloadKind,
}

impl Payload {
    /// A text payload: the bytes themselves are encrypted.
    pub fn text(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            kind: PayloadKind::Text,
        }
    }

    /// A file payload: only the file's raw SHA-256 is encrypted.
    pub fn file_hash(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            kind: PayloadKind::FileHash,
        }
    }

    fn plaintext(&self) -> Vec<u8> {
        match self.kind {
            PayloadKind::Text => self.bytes.clone(),
            PayloadKind::FileHash => sha256(&self.bytes).to_vec(),
        }
    }

    fn preview(&self, content_hash: &str) -> String {
        match self.kind {
            PayloadKind::Text => String::from_utf8_lossy(&self.bytes).into_owned(),
            PayloadKind::FileHash => format!("[RAW HASH PAYLOAD] {}", content_hash),
        }
    }
}

/// Per-commit parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitParams {
    /// Passphrase the cipher key is derived from
    pub passphrase: String,
    /// Grind the scrambled block hash instead of the ciphertext
    pub scramble: bool,
}

impl CommitParams {
    /// Parameters using the chain id as passphrase.
    pub fn for_chain(chain_id: &str) -> Self {
        Self {
            passphrase: chain_id.to_string(),
            scramble: false,
        }
    }

    /// Overrides the passphrase.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    /// Selects the scrambled-hash embedding.
    pub fn scrambled(mut self) -> Self {
        self.scramble = true;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds block `index` of `chain_id` on top of `prev_hash`.
///
/// The block starts `unlinked` with a pending steganography record.
pub fn commit_block(
    chain_id: &str,
    index: u64,
    prev_hash: &str,
    payload: Payload,
    params: &CommitParams,
) -> Result<Block> {
    if payload.bytes.is_empty() {
        return Err(ObscurityError::ValidationError("payload is empty".into()));
    }
    if params.passphrase.is_empty() {
        return Err(ObscurityError::ValidationError("passphrase is empty".into()));
    }

    let content_hash = sha256_hex(&payload.bytes);
    let encryption = encrypt(&params.passphrase, &payload.plaintext())?;
    let block_hash = compute_block_hash(index, prev_hash, &encryption.ciphertext);

    let scheme = if params.scramble {
        let hash = decode_block_hash(&block_hash)?;
        EmbedScheme::ScrambledHash {
            salt: scramble(&hash).salt,
        }
    } else {
        EmbedScheme::Ciphertext
    };

    debug!(
        chain = chain_id,
        index,
        kind = ?payload.kind,
        ciphertext_len = encryption.ciphertext.len(),
        "Encrypted payload"
    );

    let block = Block {
        header: BlockHeader {
            chain_id: chain_id.to_string(),
            index,
            is_anchor: index == 0,
            block_hash,
            prev_hash: prev_hash.to_string(),
            timestamp: Utc::now(),
            status: BlockStatus::Unlinked,
            txid: None,
        },
        content: ContentRecord {
            kind: payload.kind,
            original_filename: payload.filename.clone(),
            size_bytes: payload.bytes.len() as u64,
            preview: payload.preview(&content_hash),
            content_hash_sha256: content_hash,
        },
        encryption,
        steganography: StegoRecord::pending(scheme),
    };

    info!(
        chain = chain_id,
        index,
        hash = %&block.header.block_hash[..16],
        "Committed block"
    );
    Ok(block)
}

/// The bytes a block's keys must embed, per its scheme.
pub fn embed_bytes(block: &Block) -> Result<Vec<u8>> {
    match block.steganography.scheme {
        EmbedScheme::Ciphertext => Ok(block.encryption.ciphertext.clone()),
        EmbedScheme::ScrambledHash { salt } => {
            let hash = decode_block_hash(&block.header.block_hash)?;
            Ok(scramble_with_salt(&hash, &salt).to_vec())
        }
    }
}

pub(crate) fn decode_block_hash(block_hash: &str) -> Result<[u8; BLOCK_HASH_SIZE]> {
    let bytes = hex::decode(block_hash)?;
    bytes.try_into().map_err(|b: Vec<u8>| ObscurityError::InvalidLength {
        what: "block hash",
        expected: BLOCK_HASH_SIZE,
        actual: b.len(),
    })
}
