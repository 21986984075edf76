//! Chain-side types: node transactions, local chain metadata, node status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ObscurityError, Result};

/// One transaction output as the scanner sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Output index within the transaction
    pub n: u32,
    /// Locking script, hex
    pub script_hex: String,
}

/// The parts of a transaction the scanner reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    /// Transaction id
    pub txid: String,
    /// Outputs in transaction order
    pub outputs: Vec<TxOutput>,
}

impl ChainTransaction {
    /// Builds a transaction from explicit output scripts, numbered in order.
    pub fn from_scripts<I, S>(txid: impl Into<String>, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let outputs = scripts
            .into_iter()
            .enumerate()
            .map(|(n, script)| TxOutput {
                n: n as u32,
                script_hex: script.into(),
            })
            .collect();
        Self {
            txid: txid.into(),
            outputs,
        }
    }

    /// Parses a verbose node transaction (`getrawtransaction <txid> true`
    /// or an entry of `getblock <hash> 2`).
    ///
    /// Outputs without a script are skipped; outputs are sorted by `n`.
    pub fn from_rpc(value: &Value) -> Result<Self> {
        let txid = value
            .get("txid")
            .and_then(Value::as_str)
            .ok_or_else(|| ObscurityError::InvalidChainData("transaction without txid".into()))?
            .to_string();

        let vout = value
            .get("vout")
            .and_then(Value::as_array)
            .ok_or_else(|| ObscurityError::InvalidChainData(format!("transaction {} has no vout", txid)))?;

        let mut outputs: Vec<TxOutput> = vout
            .iter()
            .enumerate()
            .filter_map(|(pos, out)| {
                let script_hex = out
                    .get("scriptPubKey")
                    .and_then(|s| s.get("hex"))
                    .and_then(Value::as_str)?
                    .to_string();
                let n = out
                    .get("n")
                    .and_then(Value::as_u64)
                    .map(|n| n as u32)
                    .unwrap_or(pos as u32);
                Some(TxOutput { n, script_hex })
            })
            .collect();
        outputs.sort_by_key(|o| o.n);

        Ok(Self { txid, outputs })
    }
}

/// Whether a local chain was started fresh or forked from another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    /// Independent timeline starting at block 0
    Anchor,
    /// Copy of another chain's prefix
    Fork,
}

/// Metadata of a local chain of blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMeta {
    /// Display name
    pub name: String,
    /// 8-hex-character identifier
    pub id: String,
    /// Anchor or fork
    #[serde(rename = "type")]
    pub kind: ChainKind,
    /// Chain this one was forked from
    #[serde(default)]
    pub parent_chain: Option<String>,
    /// Last block index copied from the parent
    #[serde(default)]
    pub fork_index: Option<u64>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Summary of a node connection check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Network name reported by the node (`main`, `test`, `regtest`, ...)
    pub chain: String,
    /// Current block height
    pub blocks: u64,
    /// Round-trip time of the check
    pub latency_ms: u64,
}
