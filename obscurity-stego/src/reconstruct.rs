//! Chain-side reconstruction.
//!
//! Pulls the embedded bytes back out of a transaction by reading the X
//! prefix of every pay-to-pubkey output, in output order. A reconstruction
//! proves nothing by itself; only [`crate::verify`] is authoritative.

use tracing::debug;

use obscurity_core::constants::{
    COMPRESSED_PUBKEY_SIZE, OP_CHECKSIG, OP_PUSHBYTES_33, P2PK_SCRIPT_HEX_LEN,
};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::ChainTransaction;

use crate::encode::P2pkScript;

/// Bytes rebuilt from one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconstruction {
    /// Embedded bytes, truncated to the expected length
    pub bytes: Vec<u8>,
    /// Output indices that contributed, in order
    pub outputs_used: Vec<u32>,
}

/// Returns true if `script_hex` has the compressed pay-to-pubkey shape:
/// 70 hex chars, `21` prefix, `ac` suffix.
pub fn is_p2pk_script(script_hex: &str) -> bool {
    script_hex.len() == P2PK_SCRIPT_HEX_LEN
        && script_hex
            .get(..2)
            .is_some_and(|p| p.eq_ignore_ascii_case(&hex::encode([OP_PUSHBYTES_33])))
        && script_hex
            .get(P2PK_SCRIPT_HEX_LEN - 2..)
            .is_some_and(|s| s.eq_ignore_ascii_case(&hex::encode([OP_CHECKSIG])))
}

/// Pay-to-pubkey outputs of a transaction, in output order.
///
/// Outputs that look right but do not decode are skipped.
pub fn extract_keys(tx: &ChainTransaction) -> Vec<(u32, P2pkScript)> {
    tx.outputs
        .iter()
        .filter(|o| is_p2pk_script(&o.script_hex))
        .filter_map(|o| P2pkScript::from_hex(&o.script_hex).ok().map(|s| (o.n, s)))
        .collect()
}

/// Rebuilds `expected_len` bytes from a transaction's pay-to-pubkey outputs.
///
/// Each matching output contributes `chunk_size` bytes from its key, taken
/// right after the parity byte. Fails with
/// [`ObscurityError::InsufficientData`] when the outputs run out first.
pub fn reconstruct(
    tx: &ChainTransaction,
    chunk_size: usize,
    expected_len: usize,
) -> Result<Reconstruction> {
    if chunk_size == 0 || chunk_size >= COMPRESSED_PUBKEY_SIZE {
        return Err(ObscurityError::ValidationError(format!(
            "chunk size {} does not fit a compressed key",
            chunk_size
        )));
    }

    let mut bytes = Vec::with_capacity(expected_len + chunk_size);
    let mut outputs_used = Vec::new();

    for (n, script) in extract_keys(tx) {
        if bytes.len() >= expected_len {
            break;
        }
        bytes.extend_from_slice(&script.public_key()[1..1 + chunk_size]);
        outputs_used.push(n);
    }

    if bytes.len() < expected_len {
        debug!(
            txid = %tx.txid,
            needed = expected_len,
            found = bytes.len(),
            "Not enough pay-to-pubkey outputs"
        );
        return Err(ObscurityError::InsufficientData {
            needed: expected_len,
            found: bytes.len(),
        });
    }

    bytes.truncate(expected_len);
    Ok(Reconstruction {
        bytes,
        outputs_used,
    })
}
