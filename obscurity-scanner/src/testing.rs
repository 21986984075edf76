//! Shared fixtures for scanner tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{BlockStore, NodeRpc};
use obscurity_core::types::{Block, ChainTransaction, Difficulty};
use obscurity_registry::{append_block, create_anchor, MemoryStore};
use obscurity_stego::{embed_bytes, plan, CommitParams, P2pkScript, Payload};

/// A key whose X coordinate starts with `chunk`.
pub(crate) fn fake_key(chunk: &[u8]) -> String {
    let mut pk = vec![0x03];
    pk.extend_from_slice(chunk);
    pk.resize(33, 0x5a);
    hex::encode(pk)
}

/// Commits `text` to a fresh anchor chain, optionally recording fake keys.
pub(crate) async fn ground_block(store: &MemoryStore, text: &str, grind: bool) -> (String, Block) {
    let chain = create_anchor(store, "fixture").await.unwrap();
    let params = CommitParams::for_chain(&chain.id);
    let block = append_block(store, &chain.id, Payload::text("msg.txt", text), &params)
        .await
        .unwrap();
    if !grind {
        return (chain.id, block);
    }

    let difficulty = Difficulty::default();
    let keys: Vec<String> = plan(&embed_bytes(&block).unwrap(), difficulty)
        .chunks
        .iter()
        .map(|c| fake_key(c))
        .collect();
    let block = store
        .update_block(
            &chain.id,
            block.index(),
            Box::new(move |b: &mut Block| b.record_keys(difficulty, keys)),
        )
        .await
        .unwrap();
    (chain.id, block)
}

/// A transaction with one witness output followed by pay-to-pubkey outputs.
pub(crate) fn carrier(txid: &str, keys: &[String]) -> ChainTransaction {
    let mut scripts = vec!["0014aabbccddeeff00112233445566778899aabbccdd".to_string()];
    scripts.extend(keys.iter().map(|k| P2pkScript::from_public_key_hex(k).unwrap().to_hex()));
    tx_with_scripts(txid, scripts)
}

pub(crate) fn tx_with_scripts(txid: &str, scripts: Vec<String>) -> ChainTransaction {
    ChainTransaction::from_scripts(txid, scripts)
}

fn tx_json(tx: &ChainTransaction) -> Value {
    let vout: Vec<Value> = tx
        .outputs
        .iter()
        .map(|o| json!({ "n": o.n, "scriptPubKey": { "hex": o.script_hex } }))
        .collect();
    json!({ "txid": tx.txid, "vout": vout })
}

/// In-memory node. Block `h` has hash `"h{h}"`; the last block is the tip.
#[derive(Default)]
pub(crate) struct MockChain {
    blocks: Mutex<Vec<Vec<Value>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockChain {
    pub(crate) fn with_empty_blocks(count: usize) -> Self {
        let chain = Self::default();
        for _ in 0..count {
            chain.push_block(Vec::new());
        }
        chain
    }

    pub(crate) fn push_block(&self, txs: Vec<ChainTransaction>) {
        self.blocks.lock().push(txs.iter().map(tx_json).collect());
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn height_of(hash: &str) -> Result<usize> {
        hash.strip_prefix('h')
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| ObscurityError::Rpc {
                code: -5,
                message: "Block not found".into(),
            })
    }
}

#[async_trait]
impl NodeRpc for MockChain {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ObscurityError::HttpError("connection refused".into()));
        }

        let blocks = self.blocks.lock();
        let missing = || ObscurityError::Rpc {
            code: -5,
            message: "Block not found".into(),
        };
        match method {
            "getbestblockhash" => {
                let tip = blocks.len().checked_sub(1).ok_or_else(missing)?;
                Ok(json!(format!("h{}", tip)))
            }
            "getblockhash" => {
                let height = params[0].as_u64().unwrap_or(u64::MAX) as usize;
                if height >= blocks.len() {
                    return Err(missing());
                }
                Ok(json!(format!("h{}", height)))
            }
            "getblock" => {
                let hash = params[0].as_str().unwrap_or_default();
                let height = Self::height_of(hash)?;
                let txs = blocks.get(height).ok_or_else(missing)?;
                if params[1] == json!(1) {
                    Ok(json!({ "hash": hash, "height": height }))
                } else {
                    Ok(json!({ "hash": hash, "tx": txs }))
                }
            }
            "getrawtransaction" => {
                let txid = params[0].as_str().unwrap_or_default();
                blocks
                    .iter()
                    .flatten()
                    .find(|tx| tx["txid"] == json!(txid))
                    .cloned()
                    .ok_or_else(|| ObscurityError::Rpc {
                        code: -5,
                        message: "No such mempool or blockchain transaction".into(),
                    })
            }
            other => Err(ObscurityError::Rpc {
                code: -32601,
                message: format!("Method not found: {}", other),
            }),
        }
    }
}
