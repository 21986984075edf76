//! In-memory block store.
//!
//! Fast, thread-safe storage suitable for tests and single-process runs.
//! Also the working set behind [`crate::FileStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{BlockStore, BlockUpdate};
use obscurity_core::types::{Block, ChainMeta, Lockbox};

/// In-memory block store.
///
/// # Atomic updates
///
/// [`update_block`](BlockStore::update_block) runs its closure on a copy of
/// the block while holding the chain's map shard, then swaps the copy in
/// only if the closure succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Chain id → metadata
    chains: DashMap<String, ChainMeta>,
    /// Chain id → blocks by index
    blocks: DashMap<String, BTreeMap<u64, Block>>,
    /// (chain id, block index) → lockbox
    lockboxes: DashMap<(String, u64), Lockbox>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Returns true if no chain is stored.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.chains.clear();
        self.blocks.clear();
        self.lockboxes.clear();
    }

    /// Overwrites a block without any checks. Used to roll back a write
    /// that could not be persisted.
    pub(crate) fn replace_block(&self, block: Block) {
        self.blocks
            .entry(block.chain_id().to_string())
            .or_default()
            .insert(block.index(), block);
    }

    pub(crate) fn remove_block(&self, chain_id: &str, index: u64) {
        if let Some(mut chain) = self.blocks.get_mut(chain_id) {
            chain.remove(&index);
        }
    }

    /// Loads records read from disk, bypassing duplicate checks.
    pub(crate) fn import(&self, chains: Vec<ChainMeta>, blocks: Vec<Block>, lockboxes: Vec<Lockbox>) {
        for meta in chains {
            self.blocks.entry(meta.id.clone()).or_default();
            self.chains.insert(meta.id.clone(), meta);
        }
        for block in blocks {
            self.replace_block(block);
        }
        for lockbox in lockboxes {
            self.lockboxes
                .insert((lockbox.chain_id.clone(), lockbox.block_index), lockbox);
        }
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put_chain(&self, meta: ChainMeta) -> Result<()> {
        self.blocks.entry(meta.id.clone()).or_default();
        self.chains.insert(meta.id.clone(), meta);
        Ok(())
    }

    async fn get_chain(&self, chain_id: &str) -> Result<ChainMeta> {
        self.chains
            .get(chain_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ObscurityError::ChainNotFound(chain_id.to_string()))
    }

    async fn chains(&self) -> Result<Vec<ChainMeta>> {
        let mut chains: Vec<ChainMeta> = self.chains.iter().map(|e| e.value().clone()).collect();
        chains.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(chains)
    }

    #[instrument(skip(self, block), fields(chain = %block.chain_id(), index = block.index()))]
    async fn insert_block(&self, block: Block) -> Result<()> {
        let chain_id = block.chain_id().to_string();
        let index = block.index();

        let mut chain = self
            .blocks
            .get_mut(&chain_id)
            .ok_or_else(|| ObscurityError::ChainNotFound(chain_id.clone()))?;
        if chain.contains_key(&index) {
            return Err(ObscurityError::DuplicateBlock { chain_id, index });
        }
        chain.insert(index, block);

        debug!("Stored block");
        Ok(())
    }

    async fn get_block(&self, chain_id: &str, index: u64) -> Result<Block> {
        let chain = self
            .blocks
            .get(chain_id)
            .ok_or_else(|| ObscurityError::ChainNotFound(chain_id.to_string()))?;
        chain
            .get(&index)
            .cloned()
            .ok_or_else(|| ObscurityError::BlockNotFound {
                chain_id: chain_id.to_string(),
                index,
            })
    }

    async fn blocks(&self, chain_id: &str) -> Result<Vec<Block>> {
        let chain = self
            .blocks
            .get(chain_id)
            .ok_or_else(|| ObscurityError::ChainNotFound(chain_id.to_string()))?;
        Ok(chain.values().cloned().collect())
    }

    #[instrument(skip(self, update))]
    async fn update_block(&self, chain_id: &str, index: u64, update: BlockUpdate) -> Result<Block> {
        let mut chain = self
            .blocks
            .get_mut(chain_id)
            .ok_or_else(|| ObscurityError::ChainNotFound(chain_id.to_string()))?;
        let stored = chain
            .get_mut(&index)
            .ok_or_else(|| ObscurityError::BlockNotFound {
                chain_id: chain_id.to_string(),
                index,
            })?;

        let mut draft = stored.clone();
        update(&mut draft)?;
        *stored = draft.clone();

        debug!(status = %draft.status(), "Updated block");
        Ok(draft)
    }

    async fn put_lockbox(&self, lockbox: Lockbox) -> Result<()> {
        lockbox.validate()?;
        self.lockboxes
            .insert((lockbox.chain_id.clone(), lockbox.block_index), lockbox);
        Ok(())
    }

    async fn get_lockbox(&self, chain_id: &str, index: u64) -> Result<Lockbox> {
        self.lockboxes
            .get(&(chain_id.to_string(), index))
            .map(|entry| entry.clone())
            .ok_or_else(|| ObscurityError::LockboxNotFound {
                chain_id: chain_id.to_string(),
                index,
            })
    }
}
