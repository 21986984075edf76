//! AES-256-GCM cipher codec.
//!
//! The symmetric key is `SHA-256(passphrase)`: the same passphrase always
//! yields the same key. Passphrases are frequently short chain identifiers,
//! so reproducibility is chosen over key strength here.
//!
//! ## Layout
//!
//! ```text
//! key        = SHA-256(passphrase)
//! nonce      = 12 random bytes
//! ct || tag  = AES-256-GCM(key, nonce, plaintext)     (tag = last 16 bytes)
//! ```
//!
//! The ciphertext and tag are stored separately; the ciphertext alone is
//! what gets ground into keys.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use obscurity_core::constants::{CIPHER_KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::EncryptedPayload;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Symmetric key derived from a passphrase. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; CIPHER_KEY_SIZE]);

impl CipherKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|e| ObscurityError::EncryptionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherKey([REDACTED])")
    }
}

/// Derives the symmetric key for a passphrase.
pub fn derive_key(passphrase: &str) -> CipherKey {
    let mut digest: [u8; CIPHER_KEY_SIZE] = Sha256::digest(passphrase.as_bytes()).into();
    let key = CipherKey(digest);
    digest.zeroize();
    key
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCRYPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Encrypts `plaintext` under `passphrase` with a fresh random nonce.
pub fn encrypt(passphrase: &str, plaintext: &[u8]) -> Result<EncryptedPayload> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    encrypt_with_nonce(passphrase, plaintext, nonce)
}

/// Encrypts with a caller-chosen nonce.
///
/// The nonce must never be reused with the same passphrase for different
/// plaintexts.
pub fn encrypt_with_nonce(
    passphrase: &str,
    plaintext: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<EncryptedPayload> {
    let cipher = derive_key(passphrase).cipher()?;
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| ObscurityError::EncryptionFailed(e.to_string()))?;

    let split = sealed
        .len()
        .checked_sub(TAG_SIZE)
        .ok_or_else(|| ObscurityError::InternalError("AES-GCM output shorter than its tag".into()))?;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&sealed[split..]);
    sealed.truncate(split);

    Ok(EncryptedPayload::new(sealed, nonce, tag, passphrase))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECRYPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Decrypts and authenticates.
///
/// Any mismatch of passphrase, nonce, tag or ciphertext is reported as
/// [`ObscurityError::AuthenticationFailed`]; no plaintext is returned.
pub fn decrypt(passphrase: &str, ciphertext: &[u8], nonce: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(ObscurityError::InvalidLength {
            what: "nonce",
            expected: NONCE_SIZE,
            actual: nonce.len(),
        });
    }
    if tag.len() != TAG_SIZE {
        return Err(ObscurityError::InvalidLength {
            what: "tag",
            expected: TAG_SIZE,
            actual: tag.len(),
        });
    }

    let cipher = derive_key(passphrase).cipher()?;
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| ObscurityError::AuthenticationFailed)
}

/// Decrypts a stored payload with its own recorded passphrase.
pub fn open(payload: &EncryptedPayload) -> Result<Vec<u8>> {
    payload.validate()?;
    decrypt(
        &payload.derivation_key,
        &payload.ciphertext,
        &payload.nonce,
        &payload.tag,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip() {
        let payload = encrypt("a1b2c3d4", b"hello").unwrap();
        assert_eq!(payload.ciphertext.len(), 5);
        assert_eq!(payload.derivation_key, "a1b2c3d4");

        let plain = decrypt("a1b2c3d4", &payload.ciphertext, &payload.nonce, &payload.tag).unwrap();
        assert_eq!(plain, b"hello");
        assert_eq!(open(&payload).unwrap(), b"hello");
    }

    #[test]
    fn test_key_derivation_deterministic() {
        assert_eq!(derive_key("chain").as_bytes(), derive_key("chain").as_bytes());
        assert_ne!(derive_key("chain").as_bytes(), derive_key("chain2").as_bytes());
        // SHA-256("abc")
        assert_eq!(
            hex::encode(derive_key("abc").as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fixed_nonce_deterministic() {
        let a = encrypt_with_nonce("k", b"data", [7u8; 12]).unwrap();
        let b = encrypt_with_nonce("k", b"data", [7u8; 12]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_nonces_differ() {
        let a = encrypt("k", b"data").unwrap();
        let b = encrypt("k", b"data").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_passphrase_rejected() {
        let p = encrypt("right", b"secret").unwrap();
        let err = decrypt("wrong", &p.ciphertext, &p.nonce, &p.tag).unwrap_err();
        assert!(matches!(err, ObscurityError::AuthenticationFailed));
        assert!(err.is_codec_failure());
    }

    #[test]
    fn test_wrong_nonce_rejected() {
        let p = encrypt("k", b"secret").unwrap();
        let mut nonce = p.nonce;
        nonce[0] ^= 1;
        assert!(decrypt("k", &p.ciphertext, &nonce, &p.tag).is_err());
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let p = encrypt("k", b"secret").unwrap();
        let mut tag = p.tag;
        tag[15] ^= 0x80;
        assert!(matches!(
            decrypt("k", &p.ciphertext, &p.nonce, &tag),
            Err(ObscurityError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_bad_lengths() {
        let p = encrypt("k", b"secret").unwrap();
        assert!(matches!(
            decrypt("k", &p.ciphertext, &p.nonce[..8], &p.tag),
            Err(ObscurityError::InvalidLength { what: "nonce", .. })
        ));
        assert!(matches!(
            decrypt("k", &p.ciphertext, &p.nonce, &p.tag[..4]),
            Err(ObscurityError::InvalidLength { what: "tag", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        assert_eq!(format!("{:?}", derive_key("k")), "CipherKey([REDACTED])");
    }

    proptest! {
        #[test]
        fn prop_tampered_ciphertext_rejected(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            flip in any::<usize>(),
        ) {
            let p = encrypt("prop", &data).unwrap();
            let mut ct = p.ciphertext.clone();
            let i = flip % ct.len();
            ct[i] ^= 0x01;
            prop_assert!(decrypt("prop", &ct, &p.nonce, &p.tag).is_err());
        }

        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let p = encrypt("prop", &data).unwrap();
            prop_assert_eq!(p.ciphertext.len(), data.len());
            prop_assert_eq!(open(&p).unwrap(), data);
        }
    }
}
