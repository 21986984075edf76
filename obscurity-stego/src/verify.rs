//! Authenticating a reconstruction.
//!
//! A prefix match on chain is only a hint. A block is confirmed only when the
//! reconstructed bytes pass authenticated decryption (ciphertext scheme) or
//! unscramble back to the block hash (scrambled-hash scheme).

use obscurity_core::constants::{NONCE_SIZE, TAG_SIZE};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::{Block, ChainTransaction, Difficulty, EmbedScheme, Lockbox};
use obscurity_crypto::{decrypt, verify_scrambled};

use crate::commit::decode_block_hash;
use crate::reconstruct::reconstruct;

/// Everything needed to recognise and decode one block on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Chain the block belongs to
    pub chain_id: String,
    /// Index of the block
    pub block_index: u64,
    /// Block hash, hex
    pub block_hash: String,
    /// First ground public key, hex
    pub first_key: String,
    /// Passphrase the cipher key derives from
    pub passphrase: String,
    /// AES-GCM nonce
    pub nonce: [u8; NONCE_SIZE],
    /// AES-GCM tag
    pub tag: [u8; TAG_SIZE],
    /// Difficulty the keys were ground at
    pub difficulty: Difficulty,
    /// Number of embedded bytes
    pub expected_len: usize,
    /// Which bytes the keys embed
    pub scheme: EmbedScheme,
}

impl Artifact {
    /// Builds an artifact from a lockbox.
    pub fn from_lockbox(lockbox: &Lockbox) -> Result<Self> {
        lockbox.validate()?;
        let first_key = lockbox
            .first_key()
            .ok_or_else(|| ObscurityError::ValidationError("lockbox holds no keys".into()))?;
        Ok(Self {
            chain_id: lockbox.chain_id.clone(),
            block_index: lockbox.block_index,
            block_hash: lockbox.target_hash.clone(),
            first_key: first_key.to_string(),
            passphrase: lockbox.encryption.derivation_key.clone(),
            nonce: lockbox.encryption.nonce,
            tag: lockbox.encryption.tag,
            difficulty: lockbox.difficulty,
            expected_len: lockbox.expected_len(),
            scheme: lockbox.scheme,
        })
    }

    /// Builds an artifact from a ground block.
    pub fn from_block(block: &Block) -> Result<Self> {
        Self::from_lockbox(&Lockbox::from_block(block)?)
    }

    /// Bytes per key.
    pub fn chunk_size(&self) -> usize {
        self.difficulty.chunk_bytes()
    }
}

/// A successful decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Transaction the bytes came from
    pub txid: String,
    /// Output indices that contributed
    pub outputs_used: Vec<u32>,
    /// Reconstructed embedded bytes
    pub embedded: Vec<u8>,
    /// Decrypted payload; `None` for scrambled-hash blocks
    pub plaintext: Option<Vec<u8>>,
}

/// Result of checking one transaction against one artifact.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// Reconstructed and authenticated
    Verified(Decoded),
    /// Not enough pay-to-pubkey outputs; try again later
    Insufficient {
        /// Bytes required
        needed: usize,
        /// Bytes available
        found: usize,
    },
    /// Reconstructed but failed authentication, or unusable input
    Rejected(ObscurityError),
}

impl VerifyOutcome {
    /// Returns true if the transaction carries the artifact.
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified(_))
    }

    /// The decode, if verified.
    pub fn into_decoded(self) -> Option<Decoded> {
        match self {
            VerifyOutcome::Verified(d) => Some(d),
            _ => None,
        }
    }

    /// Converts to a `Result`, keeping each failure class distinct.
    pub fn into_result(self) -> Result<Decoded> {
        match self {
            VerifyOutcome::Verified(d) => Ok(d),
            VerifyOutcome::Insufficient { needed, found } => {
                Err(ObscurityError::InsufficientData { needed, found })
            }
            VerifyOutcome::Rejected(e) => Err(e),
        }
    }
}

/// Reconstructs `artifact` from `tx` and authenticates it.
pub fn verify(tx: &ChainTransaction, artifact: &Artifact) -> VerifyOutcome {
    let rebuilt = match reconstruct(tx, artifact.chunk_size(), artifact.expected_len) {
        Ok(r) => r,
        Err(ObscurityError::InsufficientData { needed, found }) => {
            return VerifyOutcome::Insufficient { needed, found }
        }
        Err(e) => return VerifyOutcome::Rejected(e),
    };

    let plaintext = match artifact.scheme {
        EmbedScheme::Ciphertext => {
            match decrypt(&artifact.passphrase, &rebuilt.bytes, &artifact.nonce, &artifact.tag) {
                Ok(plain) => Some(plain),
                Err(e) => return VerifyOutcome::Rejected(e),
            }
        }
        EmbedScheme::ScrambledHash { salt } => {
            let hash = match decode_block_hash(&artifact.block_hash) {
                Ok(h) => h,
                Err(e) => return VerifyOutcome::Rejected(e),
            };
            if let Err(e) = verify_scrambled(&rebuilt.bytes, &salt, &hash) {
                return VerifyOutcome::Rejected(e);
            }
            None
        }
    };

    VerifyOutcome::Verified(Decoded {
        txid: tx.txid.clone(),
        outputs_used: rebuilt.outputs_used,
        embedded: rebuilt.bytes,
        plaintext,
    })
}
