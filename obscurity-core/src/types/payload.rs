//! Encrypted payloads and the per-block encoding choices.

use serde::{Deserialize, Serialize};

use crate::constants::{CIPHER_ALGO, NONCE_SIZE, SCRAMBLE_SALT_SIZE, TAG_SIZE};
use crate::error::{ObscurityError, Result};

/// Output of the cipher codec for one block.
///
/// `decrypt(derivation_key, ciphertext, nonce, tag)` either returns the
/// original bytes or fails; it never yields unauthenticated output.
///
/// # JSON form
/// ```text
/// { "algo", "ciphertext_hex", "nonce_hex", "tag_hex", "key_used" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Algorithm label, always [`CIPHER_ALGO`] for payloads produced here
    pub algo: String,
    /// Ciphertext without the tag
    #[serde(rename = "ciphertext_hex", with = "hex")]
    pub ciphertext: Vec<u8>,
    /// 12-byte random nonce
    #[serde(rename = "nonce_hex", with = "hex")]
    pub nonce: [u8; NONCE_SIZE],
    /// 16-byte authentication tag
    #[serde(rename = "tag_hex", with = "hex")]
    pub tag: [u8; TAG_SIZE],
    /// Passphrase the symmetric key was derived from
    #[serde(rename = "key_used")]
    pub derivation_key: String,
}

impl EncryptedPayload {
    /// Assembles a payload record from codec output.
    pub fn new(
        ciphertext: Vec<u8>,
        nonce: [u8; NONCE_SIZE],
        tag: [u8; TAG_SIZE],
        derivation_key: impl Into<String>,
    ) -> Self {
        Self {
            algo: CIPHER_ALGO.to_string(),
            ciphertext,
            nonce,
            tag,
            derivation_key: derivation_key.into(),
        }
    }

    /// Rejects payloads produced by an algorithm this build cannot open.
    pub fn validate(&self) -> Result<()> {
        if self.algo != CIPHER_ALGO {
            return Err(ObscurityError::ValidationError(format!(
                "unsupported cipher algorithm: {}",
                self.algo
            )));
        }
        Ok(())
    }
}

/// What a committed payload holds.
///
/// Chosen explicitly at commit time and persisted with the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// The user's bytes are encrypted as-is.
    Text,
    /// Only the raw 32-byte SHA-256 of the user's file is encrypted.
    FileHash,
}

/// Which bytes get ground into keys for a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbedScheme {
    /// The block's ciphertext; verified by authenticated decryption.
    Ciphertext,
    /// The scrambled 32-byte block hash; verified by unscrambling.
    ScrambledHash {
        /// Salt mixed into the scramble mask
        #[serde(with = "hex")]
        salt: [u8; SCRAMBLE_SALT_SIZE],
    },
}

impl Default for EmbedScheme {
    fn default() -> Self {
        EmbedScheme::Ciphertext
    }
}
