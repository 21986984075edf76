//! Collaborator traits for Obscurity.
//!
//! These traits are the seams between the encode/grind/decode pipeline and
//! the things it drives: key-search engines, a chain node, and durable
//! storage. Each has a production implementation and a test double.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ObscurityError, Result};
use crate::types::{
    Block, BlockStatus, ChainMeta, ChainTransaction, Difficulty, FoundKey, GrindTarget, Lockbox,
};

// ═══════════════════════════════════════════════════════════════════════════════
// KEY SEARCH
// ═══════════════════════════════════════════════════════════════════════════════

/// One long-lived key-search session.
///
/// A session answers one request at a time; callers never share a session
/// between workers.
#[async_trait]
pub trait KeySearcher: Send {
    /// Searches for a key whose compressed public key starts with the
    /// target's chunk (after the parity byte).
    async fn search(&mut self, target: &GrindTarget) -> Result<FoundKey>;

    /// Ends the session and releases whatever backs it.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Opens key-search sessions for a worker pool.
#[async_trait]
pub trait SearcherFactory: Send + Sync {
    /// Session type produced by this factory.
    type Searcher: KeySearcher + 'static;

    /// Opens a session for `worker_id` at the given difficulty.
    async fn spawn(&self, worker_id: usize, difficulty: Difficulty) -> Result<Self::Searcher>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE RPC
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-RPC access to a chain node.
///
/// Only [`call`](NodeRpc::call) is required; the typed helpers cover the
/// handful of methods the scanner consumes.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Submits one request and returns its `result`, or the node's error.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;

    /// Fetches a transaction by id (verbose).
    async fn raw_transaction(&self, txid: &str) -> Result<ChainTransaction> {
        let value = self
            .call("getrawtransaction", vec![json!(txid), json!(true)])
            .await?;
        ChainTransaction::from_rpc(&value)
    }

    /// Hash of the chain tip.
    async fn best_block_hash(&self) -> Result<String> {
        let value = self.call("getbestblockhash", vec![]).await?;
        as_string(value, "getbestblockhash")
    }

    /// Hash of the block at `height`.
    async fn block_hash(&self, height: u64) -> Result<String> {
        let value = self.call("getblockhash", vec![json!(height)]).await?;
        as_string(value, "getblockhash")
    }

    /// Height of the block with `hash`.
    async fn block_height(&self, hash: &str) -> Result<u64> {
        let value = self.call("getblock", vec![json!(hash), json!(1)]).await?;
        value
            .get("height")
            .and_then(Value::as_u64)
            .ok_or_else(|| ObscurityError::InvalidChainData(format!("block {} has no height", hash)))
    }

    /// Every transaction of the block with `hash`, decoded.
    async fn block_transactions(&self, hash: &str) -> Result<Vec<ChainTransaction>> {
        let value = self.call("getblock", vec![json!(hash), json!(2)]).await?;
        let txs = value
            .get("tx")
            .and_then(Value::as_array)
            .ok_or_else(|| ObscurityError::InvalidChainData(format!("block {} has no tx list", hash)))?;
        txs.iter().map(ChainTransaction::from_rpc).collect()
    }

    /// Raw `getblockchaininfo` result.
    async fn blockchain_info(&self) -> Result<Value> {
        self.call("getblockchaininfo", vec![]).await
    }
}

fn as_string(value: Value, method: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ObscurityError::InvalidChainData(format!("{} returned {}", method, value)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-place edit applied to a stored block under the store's lock.
pub type BlockUpdate = Box<dyn FnOnce(&mut Block) -> Result<()> + Send>;

/// Durable storage for chains, blocks and lockboxes.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Records chain metadata.
    async fn put_chain(&self, meta: ChainMeta) -> Result<()>;

    /// Loads chain metadata.
    async fn get_chain(&self, chain_id: &str) -> Result<ChainMeta>;

    /// Lists every chain.
    async fn chains(&self) -> Result<Vec<ChainMeta>>;

    /// Stores a new block. Fails if the position is taken.
    async fn insert_block(&self, block: Block) -> Result<()>;

    /// Loads one block.
    async fn get_block(&self, chain_id: &str, index: u64) -> Result<Block>;

    /// Lists a chain's blocks in index order.
    async fn blocks(&self, chain_id: &str) -> Result<Vec<Block>>;

    /// Applies `update` to a stored block atomically and returns the result.
    ///
    /// If `update` fails, the stored block is left unchanged.
    async fn update_block(&self, chain_id: &str, index: u64, update: BlockUpdate) -> Result<Block>;

    /// Persists a lockbox.
    async fn put_lockbox(&self, lockbox: Lockbox) -> Result<()>;

    /// Loads a lockbox.
    async fn get_lockbox(&self, chain_id: &str, index: u64) -> Result<Lockbox>;

    /// Moves a block to `to` if its current status is one of `from`,
    /// optionally recording a transaction id, as one atomic step.
    async fn transition_status(
        &self,
        chain_id: &str,
        index: u64,
        from: &[BlockStatus],
        to: BlockStatus,
        txid: Option<String>,
    ) -> Result<Block> {
        let from = from.to_vec();
        self.update_block(
            chain_id,
            index,
            Box::new(move |block: &mut Block| {
                let current = block.status();
                if !from.contains(&current) {
                    return Err(ObscurityError::InvalidTransition {
                        index: block.index(),
                        from: current.to_string(),
                        to: to.to_string(),
                    });
                }
                block.apply_transition(to)?;
                if txid.is_some() {
                    block.header.txid = txid;
                }
                Ok(())
            }),
        )
        .await
    }

    /// Last block of a chain, if any.
    async fn tip(&self, chain_id: &str) -> Result<Option<Block>> {
        Ok(self.blocks(chain_id).await?.pop())
    }

    /// Every ground block not yet confirmed on chain, across all chains.
    async fn awaiting_chain(&self) -> Result<Vec<Block>> {
        let mut pending = Vec::new();
        for chain in self.chains().await? {
            for block in self.blocks(&chain.id).await? {
                if block.status().is_awaiting_chain() && block.first_key().is_some() {
                    pending.push(block);
                }
            }
        }
        Ok(pending)
    }
}
