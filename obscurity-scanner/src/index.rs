//! Pending-match index.
//!
//! Maps the first public key of every ground, unconfirmed block to the
//! artifact needed to verify it. Matching the first key is a cheap
//! pre-filter; false positives are expected and are weeded out by full
//! verification.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};

use obscurity_core::error::Result;
use obscurity_core::traits::BlockStore;
use obscurity_core::types::ChainTransaction;
use obscurity_stego::{extract_keys, Artifact};

/// Artifacts awaiting confirmation, keyed by first public key (lowercase hex).
#[derive(Debug, Default)]
pub struct PendingIndex {
    by_first_key: RwLock<HashMap<String, Vec<Artifact>>>,
}

impl PendingIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from artifacts.
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let index = Self::new();
        for artifact in artifacts {
            index.insert(artifact);
        }
        index
    }

    /// Builds an index from every `ready_to_link` or `linked` block in `store`.
    ///
    /// Blocks whose records do not form a valid artifact are skipped.
    pub async fn from_store<S: BlockStore + ?Sized>(store: &S) -> Result<Self> {
        let index = Self::new();
        for block in store.awaiting_chain().await? {
            match Artifact::from_block(&block) {
                Ok(artifact) => index.insert(artifact),
                Err(e) => warn!(
                    chain = block.chain_id(),
                    index = block.index(),
                    error = %e,
                    "Skipping unusable pending block"
                ),
            }
        }
        debug!(pending = index.len(), "Built pending index");
        Ok(index)
    }

    /// Adds an artifact. Re-inserting the same block replaces it.
    pub fn insert(&self, artifact: Artifact) {
        let key = artifact.first_key.to_lowercase();
        let mut map = self.by_first_key.write();
        let bucket = map.entry(key).or_default();
        bucket.retain(|a| !(a.chain_id == artifact.chain_id && a.block_index == artifact.block_index));
        bucket.push(artifact);
    }

    /// Artifacts whose first key is `public_key_hex`.
    pub fn candidates(&self, public_key_hex: &str) -> Vec<Artifact> {
        self.by_first_key
            .read()
            .get(&public_key_hex.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Artifacts whose first key appears among `tx`'s pay-to-pubkey outputs.
    pub fn match_transaction(&self, tx: &ChainTransaction) -> Vec<Artifact> {
        let map = self.by_first_key.read();
        let mut hits: Vec<Artifact> = Vec::new();
        for (_, script) in extract_keys(tx) {
            if let Some(bucket) = map.get(&hex::encode(script.public_key())) {
                for artifact in bucket {
                    let seen = hits
                        .iter()
                        .any(|h| h.chain_id == artifact.chain_id && h.block_index == artifact.block_index);
                    if !seen {
                        hits.push(artifact.clone());
                    }
                }
            }
        }
        hits
    }

    /// Drops a confirmed block. Returns true if it was pending.
    pub fn remove(&self, chain_id: &str, block_index: u64) -> bool {
        let mut map = self.by_first_key.write();
        let mut removed = false;
        map.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|a| !(a.chain_id == chain_id && a.block_index == block_index));
            removed |= bucket.len() != before;
            !bucket.is_empty()
        });
        removed
    }

    /// Number of pending artifacts.
    pub fn len(&self) -> usize {
        self.by_first_key.read().values().map(Vec::len).sum()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.by_first_key.read().is_empty()
    }

    /// Every pending artifact.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.by_first_key.read().values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{carrier, ground_block, tx_with_scripts};
    use obscurity_core::types::BlockStatus;
    use obscurity_registry::MemoryStore;
    use obscurity_stego::P2pkScript;

    #[tokio::test]
    async fn test_from_store_picks_ground_blocks() {
        let store = MemoryStore::new();
        let (chain, ground) = ground_block(&store, "hello", true).await;
        let (_, unground) = ground_block(&store, "not yet", false).await;
        assert_eq!(unground.status(), BlockStatus::Unlinked);

        let index = PendingIndex::from_store(&store).await.unwrap();
        assert_eq!(index.len(), 1);
        let first = ground.first_key().unwrap();
        let hits = index.candidates(&first.to_uppercase());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chain_id, chain);
    }

    #[tokio::test]
    async fn test_match_transaction_and_remove() {
        let store = MemoryStore::new();
        let (chain, block) = ground_block(&store, "hello", true).await;
        let index = PendingIndex::from_store(&store).await.unwrap();

        let tx = carrier("aa", &block.steganography.keys);
        let hits = index.match_transaction(&tx);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].block_index, block.index());

        let unrelated = tx_with_scripts("bb", vec!["0014deadbeef".to_string()]);
        assert!(index.match_transaction(&unrelated).is_empty());

        assert!(index.remove(&chain, block.index()));
        assert!(!index.remove(&chain, block.index()));
        assert!(index.is_empty());
        assert!(index.match_transaction(&tx).is_empty());
    }

    #[tokio::test]
    async fn test_only_first_key_indexed() {
        let store = MemoryStore::new();
        let (_, block) = ground_block(&store, "a payload long enough for several keys", true).await;
        let index = PendingIndex::from_store(&store).await.unwrap();

        let second = P2pkScript::from_public_key_hex(&block.steganography.keys[1]).unwrap();
        let tx = tx_with_scripts("cc", vec![second.to_hex()]);
        assert!(index.match_transaction(&tx).is_empty());
    }

    #[tokio::test]
    async fn test_reinsert_replaces() {
        let store = MemoryStore::new();
        let (_, block) = ground_block(&store, "hello", true).await;
        let artifact = Artifact::from_block(&block).unwrap();

        let index = PendingIndex::from_artifacts([artifact.clone(), artifact.clone()]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.artifacts(), vec![artifact]);
    }
}
