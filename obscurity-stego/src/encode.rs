//! Output encoding.
//!
//! Each ground key becomes a compressed pay-to-pubkey script:
//!
//! ```text
//! 0x21 | 33-byte compressed pubkey | 0xac      (35 bytes, 70 hex chars)
//! ```
//!
//! Scripts are emitted in chunk order; output position is the only ordering
//! signal a reader has.

use std::fmt;

use obscurity_core::constants::{
    COMPRESSED_PUBKEY_SIZE, OP_CHECKSIG, OP_PUSHBYTES_33, P2PK_SCRIPT_SIZE,
};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::{GrindResult, TxOutput};

/// A compressed pay-to-pubkey locking script.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct P2pkScript([u8; P2PK_SCRIPT_SIZE]);

impl P2pkScript {
    /// Wraps a 33-byte compressed public key.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != COMPRESSED_PUBKEY_SIZE {
            return Err(ObscurityError::InvalidLength {
                what: "public key",
                expected: COMPRESSED_PUBKEY_SIZE,
                actual: public_key.len(),
            });
        }
        if !matches!(public_key[0], 0x02 | 0x03) {
            return Err(ObscurityError::InvalidPublicKey(hex::encode(public_key)));
        }

        let mut bytes = [0u8; P2PK_SCRIPT_SIZE];
        bytes[0] = OP_PUSHBYTES_33;
        bytes[1..1 + COMPRESSED_PUBKEY_SIZE].copy_from_slice(public_key);
        bytes[P2PK_SCRIPT_SIZE - 1] = OP_CHECKSIG;
        Ok(Self(bytes))
    }

    /// Wraps a hex-encoded compressed public key.
    pub fn from_public_key_hex(public_key: &str) -> Result<Self> {
        Self::from_public_key(&hex::decode(public_key)?)
    }

    /// Parses a script, accepting only the exact P2PK layout.
    pub fn from_hex(script: &str) -> Result<Self> {
        let bytes = hex::decode(script)?;
        if bytes.len() != P2PK_SCRIPT_SIZE
            || bytes[0] != OP_PUSHBYTES_33
            || bytes[P2PK_SCRIPT_SIZE - 1] != OP_CHECKSIG
        {
            return Err(ObscurityError::InvalidScript(script.to_string()));
        }
        let mut out = [0u8; P2PK_SCRIPT_SIZE];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// The embedded public key.
    pub fn public_key(&self) -> &[u8] {
        &self.0[1..1 + COMPRESSED_PUBKEY_SIZE]
    }

    /// Raw script bytes.
    pub fn as_bytes(&self) -> &[u8; P2PK_SCRIPT_SIZE] {
        &self.0
    }

    /// Hex form, as found in a node's `scriptPubKey.hex`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Transaction-output record at position `n`.
    pub fn to_tx_output(&self, n: u32) -> TxOutput {
        TxOutput {
            n,
            script_hex: self.to_hex(),
        }
    }
}

impl fmt::Debug for P2pkScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P2pkScript({})", self.to_hex())
    }
}

impl fmt::Display for P2pkScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encodes grind results into scripts.
///
/// `results` must already be in chunk order (`results[i].chunk_index == i`).
pub fn encode_outputs(results: &[GrindResult]) -> Result<Vec<P2pkScript>> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if r.chunk_index != i {
                return Err(ObscurityError::ValidationError(format!(
                    "result at position {} is for chunk {}",
                    i, r.chunk_index
                )));
            }
            P2pkScript::from_public_key(&r.public_key_bytes()?)
        })
        .collect()
}

/// Encodes an ordered list of hex public keys (as stored in a lockbox).
pub fn encode_keys<S: AsRef<str>>(keys: &[S]) -> Result<Vec<P2pkScript>> {
    keys.iter()
        .map(|k| P2pkScript::from_public_key_hex(k.as_ref()))
        .collect()
}
