//! File-backed block store.
//!
//! Keeps every record as its own JSON document so the data directory can be
//! inspected and backed up by hand:
//!
//! ```text
//! <root>/chains/<chain_id>/chain_meta.json
//! <root>/chains/<chain_id>/blocks/<index:05>_<hash8>.json
//! <root>/lockboxes/<chain_id>_blk<index>.lockbox
//! ```
//!
//! Reads are served from an in-memory copy loaded at open. Every write goes
//! to a temp file that is then renamed over the target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{BlockStore, BlockUpdate};
use obscurity_core::types::{lockbox_file_name, Block, ChainMeta, Lockbox};

use crate::MemoryStore;

const CHAINS_DIR: &str = "chains";
const BLOCKS_DIR: &str = "blocks";
const LOCKBOX_DIR: &str = "lockboxes";
const CHAIN_META_FILE: &str = "chain_meta.json";
const TEMP_EXTENSION: &str = "tmp";

/// File-backed block store.
pub struct FileStore {
    /// Data directory
    root: PathBuf,
    /// Working set
    memory: MemoryStore,
    /// Serializes writers so memory and disk change in the same order
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) the store rooted at `root` and loads
    /// everything under it.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CHAINS_DIR)).await?;
        fs::create_dir_all(root.join(LOCKBOX_DIR)).await?;

        let store = Self {
            root,
            memory: MemoryStore::new(),
            write_lock: Mutex::new(()),
        };
        store.load().await?;
        Ok(store)
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chain_dir(&self, chain_id: &str) -> PathBuf {
        self.root.join(CHAINS_DIR).join(chain_id)
    }

    fn block_path(&self, block: &Block) -> PathBuf {
        self.chain_dir(block.chain_id())
            .join(BLOCKS_DIR)
            .join(block.file_name())
    }

    fn lockbox_path(&self, chain_id: &str, index: u64) -> PathBuf {
        self.root
            .join(LOCKBOX_DIR)
            .join(lockbox_file_name(chain_id, index))
    }

    async fn load(&self) -> Result<()> {
        let mut chains = Vec::new();
        let mut blocks = Vec::new();

        for chain_dir in list_dir(&self.root.join(CHAINS_DIR)).await? {
            let meta_path = chain_dir.join(CHAIN_META_FILE);
            if !meta_path.is_file() {
                warn!(path = %chain_dir.display(), "Skipping directory without chain metadata");
                continue;
            }
            chains.push(read_json::<ChainMeta>(&meta_path).await?);

            for path in list_dir(&chain_dir.join(BLOCKS_DIR)).await? {
                if has_extension(&path, "json") {
                    blocks.push(read_json::<Block>(&path).await?);
                }
            }
        }

        let mut lockboxes = Vec::new();
        for path in list_dir(&self.root.join(LOCKBOX_DIR)).await? {
            if has_extension(&path, "lockbox") {
                lockboxes.push(read_json::<Lockbox>(&path).await?);
            }
        }

        info!(
            chains = chains.len(),
            blocks = blocks.len(),
            lockboxes = lockboxes.len(),
            "Loaded store"
        );
        self.memory.import(chains, blocks, lockboxes);
        Ok(())
    }
}

#[async_trait]
impl BlockStore for FileStore {
    async fn put_chain(&self, meta: ChainMeta) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.chain_dir(&meta.id);
        fs::create_dir_all(dir.join(BLOCKS_DIR)).await?;
        write_json(&dir.join(CHAIN_META_FILE), &meta).await?;
        self.memory.put_chain(meta).await
    }

    async fn get_chain(&self, chain_id: &str) -> Result<ChainMeta> {
        self.memory.get_chain(chain_id).await
    }

    async fn chains(&self) -> Result<Vec<ChainMeta>> {
        self.memory.chains().await
    }

    async fn insert_block(&self, block: Block) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.block_path(&block);
        self.memory.insert_block(block.clone()).await?;

        if let Err(e) = write_json(&path, &block).await {
            self.memory.remove_block(block.chain_id(), block.index());
            return Err(e);
        }
        Ok(())
    }

    async fn get_block(&self, chain_id: &str, index: u64) -> Result<Block> {
        self.memory.get_block(chain_id, index).await
    }

    async fn blocks(&self, chain_id: &str) -> Result<Vec<Block>> {
        self.memory.blocks(chain_id).await
    }

    async fn update_block(&self, chain_id: &str, index: u64, update: BlockUpdate) -> Result<Block> {
        let _guard = self.write_lock.lock().await;
        let before = self.memory.get_block(chain_id, index).await?;
        let updated = self.memory.update_block(chain_id, index, update).await?;

        if let Err(e) = write_json(&self.block_path(&updated), &updated).await {
            self.memory.replace_block(before);
            return Err(e);
        }
        Ok(updated)
    }

    async fn put_lockbox(&self, lockbox: Lockbox) -> Result<()> {
        lockbox.validate()?;
        let _guard = self.write_lock.lock().await;
        write_json(&self.lockbox_path(&lockbox.chain_id, lockbox.block_index), &lockbox).await?;
        self.memory.put_lockbox(lockbox).await
    }

    async fn get_lockbox(&self, chain_id: &str, index: u64) -> Result<Lockbox> {
        self.memory.get_lockbox(chain_id, index).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ObscurityError::StoreError(format!("{}: {}", path.display(), e)))
}

/// Writes `value` to `path` atomically (temp file, then rename).
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension(TEMP_EXTENSION);

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(&contents).await?;
    file.sync_all().await?;
    fs::rename(&temp_path, path).await?;

    debug!(path = %path.display(), bytes = contents.len(), "Wrote record");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{append_block, create_anchor};
    use obscurity_core::types::{BlockStatus, Difficulty};
    use obscurity_stego::{CommitParams, Payload};
    use tempfile::tempdir;

    fn fake_keys(block: &Block) -> Vec<String> {
        let n = block.encryption.ciphertext.len().div_ceil(4);
        (0..n).map(|i| format!("03{:02x}{}", i, "cd".repeat(31))).collect()
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempdir().unwrap();
        let (chain_id, lockbox) = {
            let store = FileStore::open(dir.path()).await.unwrap();
            let chain = create_anchor(&store, "notes").await.unwrap();
            let params = CommitParams::for_chain(&chain.id);
            append_block(&store, &chain.id, Payload::text("msg.txt", "first"), &params)
                .await
                .unwrap();
            let second = append_block(&store, &chain.id, Payload::text("msg.txt", "second"), &params)
                .await
                .unwrap();

            let keys = fake_keys(&second);
            let ground = store
                .update_block(
                    &chain.id,
                    1,
                    Box::new(move |b: &mut Block| b.record_keys(Difficulty::default(), keys)),
                )
                .await
                .unwrap();
            let lockbox = Lockbox::from_block(&ground).unwrap();
            store.put_lockbox(lockbox.clone()).await.unwrap();
            (chain.id, lockbox)
        };

        let reopened = FileStore::open(dir.path()).await.unwrap();
        let blocks = reopened.blocks(&chain_id).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].status(), BlockStatus::ReadyToLink);
        assert_eq!(blocks[1].header.prev_hash, blocks[0].header.block_hash);
        assert_eq!(reopened.get_lockbox(&chain_id, 1).await.unwrap(), lockbox);
        assert_eq!(reopened.chains().await.unwrap()[0].name, "notes");
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let chain = create_anchor(&store, "layout").await.unwrap();
        let block = append_block(
            &store,
            &chain.id,
            Payload::text("msg.txt", "hi"),
            &CommitParams::for_chain(&chain.id),
        )
        .await
        .unwrap();

        let chain_dir = dir.path().join("chains").join(&chain.id);
        assert!(chain_dir.join("chain_meta.json").is_file());
        let block_file = chain_dir.join("blocks").join(block.file_name());
        assert!(block_file.is_file());
        assert!(block.file_name().starts_with("00000_"));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(block_file).unwrap()).unwrap();
        assert_eq!(raw["header"]["status"], "unlinked");

        let leftovers: Vec<_> = std::fs::read_dir(chain_dir.join("blocks"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_reported() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            create_anchor(&store, "x").await.unwrap();
        }
        let chain_dir = std::fs::read_dir(dir.path().join("chains"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        std::fs::write(chain_dir.join("chain_meta.json"), b"{not json").unwrap();

        assert!(matches!(
            FileStore::open(dir.path()).await,
            Err(ObscurityError::StoreError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_update_not_persisted() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let chain = create_anchor(&store, "x").await.unwrap();
        append_block(
            &store,
            &chain.id,
            Payload::text("msg.txt", "hi"),
            &CommitParams::for_chain(&chain.id),
        )
        .await
        .unwrap();

        // Unlinked blocks cannot jump straight to verified
        let err = store
            .transition_status(&chain.id, 0, &[BlockStatus::Unlinked], BlockStatus::Verified, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ObscurityError::InvalidTransition { .. }));

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get_block(&chain.id, 0).await.unwrap().status(),
            BlockStatus::Unlinked
        );
    }
}
