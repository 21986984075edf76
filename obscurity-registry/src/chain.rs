//! Anchors, forks and appending blocks.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use obscurity_core::constants::{CHAIN_ID_LEN, GENESIS_PREV_HASH};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::BlockStore;
use obscurity_core::types::{Block, ChainKind, ChainMeta};
use obscurity_stego::{commit_block, CommitParams, Payload};

/// Generates a fresh 8-hex-character chain id.
pub fn new_chain_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(CHAIN_ID_LEN);
    id
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ObscurityError::ValidationError("chain name is empty".into()));
    }
    Ok(name)
}

/// Starts a new, empty chain.
#[instrument(skip(store))]
pub async fn create_anchor<S: BlockStore + ?Sized>(store: &S, name: &str) -> Result<ChainMeta> {
    let meta = ChainMeta {
        name: check_name(name)?.to_string(),
        id: new_chain_id(),
        kind: ChainKind::Anchor,
        parent_chain: None,
        fork_index: None,
        created_at: Utc::now(),
    };
    store.put_chain(meta.clone()).await?;

    info!(chain = %meta.id, "Created anchor chain");
    Ok(meta)
}

/// Starts a new chain holding copies of `source`'s blocks `0..=at_index`.
///
/// Copies keep their status, keys and txid; only the owning chain id changes.
#[instrument(skip(store))]
pub async fn fork_chain<S: BlockStore + ?Sized>(
    store: &S,
    source: &str,
    at_index: u64,
    name: &str,
) -> Result<ChainMeta> {
    let name = check_name(name)?;
    store.get_chain(source).await?;

    let copied: Vec<Block> = store
        .blocks(source)
        .await?
        .into_iter()
        .filter(|b| b.index() <= at_index)
        .collect();
    if !copied.iter().any(|b| b.index() == at_index) {
        return Err(ObscurityError::BlockNotFound {
            chain_id: source.to_string(),
            index: at_index,
        });
    }

    let meta = ChainMeta {
        name: name.to_string(),
        id: new_chain_id(),
        kind: ChainKind::Fork,
        parent_chain: Some(source.to_string()),
        fork_index: Some(at_index),
        created_at: Utc::now(),
    };
    store.put_chain(meta.clone()).await?;

    let count = copied.len();
    for mut block in copied {
        block.header.chain_id = meta.id.clone();
        store.insert_block(block).await?;
    }

    info!(chain = %meta.id, parent = source, blocks = count, "Forked chain");
    Ok(meta)
}

/// Commits `payload` as the next block of `chain_id`.
///
/// The new block links to the current tip, or to the all-zero hash if the
/// chain is empty.
#[instrument(skip(store, payload, params))]
pub async fn append_block<S: BlockStore + ?Sized>(
    store: &S,
    chain_id: &str,
    payload: Payload,
    params: &CommitParams,
) -> Result<Block> {
    store.get_chain(chain_id).await?;

    let (index, prev_hash) = match store.tip(chain_id).await? {
        Some(tip) => (tip.index() + 1, tip.header.block_hash),
        None => (0, GENESIS_PREV_HASH.to_string()),
    };

    let block = commit_block(chain_id, index, &prev_hash, payload, params)?;
    store.insert_block(block.clone()).await?;
    Ok(block)
}
