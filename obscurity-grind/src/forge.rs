//! Grind-a-block pipeline.

use tracing::{info, instrument};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{BlockStore, SearcherFactory};
use obscurity_core::types::{Block, BlockStatus, Lockbox};
use obscurity_stego::{embed_bytes, encode_outputs, plan};

use crate::pool::GrindPool;

/// Grinds a stored `unlinked` block and persists its lockbox.
///
/// The block's keys, difficulty and `ready_to_link` status are written in
/// one store update after the whole grind succeeds; a failed grind leaves
/// the block untouched. Private keys are not kept.
#[instrument(skip(store, pool), fields(difficulty = %pool.difficulty()))]
pub async fn forge_lockbox<S, F>(
    store: &S,
    pool: &GrindPool<F>,
    chain_id: &str,
    block_index: u64,
) -> Result<Lockbox>
where
    S: BlockStore + ?Sized,
    F: SearcherFactory + 'static,
{
    let block = store.get_block(chain_id, block_index).await?;
    if block.status() != BlockStatus::Unlinked {
        return Err(ObscurityError::InvalidTransition {
            index: block_index,
            from: block.status().to_string(),
            to: BlockStatus::ReadyToLink.to_string(),
        });
    }

    let difficulty = pool.difficulty();
    let chunks = plan(&embed_bytes(&block)?, difficulty);
    let results = pool.grind(&chunks).await?;
    let keys: Vec<String> = encode_outputs(&results)?
        .iter()
        .map(|script| hex::encode(script.public_key()))
        .collect();

    let updated = store
        .update_block(
            chain_id,
            block_index,
            Box::new(move |b: &mut Block| b.record_keys(difficulty, keys)),
        )
        .await?;

    let lockbox = Lockbox::from_block(&updated)?;
    store.put_lockbox(lockbox.clone()).await?;

    info!(
        chain = chain_id,
        index = block_index,
        keys = lockbox.keys.len(),
        "Block ready to link"
    );
    Ok(lockbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use obscurity_core::traits::KeySearcher;
    use obscurity_core::types::{ChainTransaction, Difficulty, FoundKey, GrindTarget, StegoStatus};
    use obscurity_registry::{append_block, create_anchor, MemoryStore};
    use obscurity_stego::{embed_bytes, encode_keys, plan, reconstruct, verify, Artifact, CommitParams, Payload};

    use crate::config::GrindConfig;
    use crate::local::LocalFactory;

    /// Answers every target with `03 || chunk || 0x11...`.
    struct Echo {
        fail: bool,
    }

    #[async_trait]
    impl SearcherFactory for Echo {
        type Searcher = EchoSession;

        async fn spawn(&self, _worker_id: usize, _difficulty: Difficulty) -> Result<EchoSession> {
            Ok(EchoSession { fail: self.fail })
        }
    }

    struct EchoSession {
        fail: bool,
    }

    #[async_trait]
    impl KeySearcher for EchoSession {
        async fn search(&mut self, target: &GrindTarget) -> Result<FoundKey> {
            if self.fail {
                return Err(ObscurityError::WorkerCrashed {
                    worker: 0,
                    reason: "boom".into(),
                });
            }
            let mut pk = vec![0x03];
            pk.extend_from_slice(&target.chunk);
            pk.resize(33, 0x11);
            Ok(FoundKey {
                private_key: "22".repeat(32),
                public_key: hex::encode(pk),
                attempts: 1,
            })
        }

        async fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    async fn stored_block(store: &MemoryStore, text: &str) -> (String, u64) {
        let chain = create_anchor(store, "test").await.unwrap();
        let params = CommitParams::for_chain(&chain.id);
        let block = append_block(store, &chain.id, Payload::text("m.txt", text), &params)
            .await
            .unwrap();
        (chain.id, block.index())
    }

    #[tokio::test]
    async fn test_forge_then_decode() {
        let store = MemoryStore::new();
        let (chain, index) = stored_block(&store, "hello").await;
        let pool = GrindPool::new(Echo { fail: false }, GrindConfig::new().workers(2));

        let lockbox = forge_lockbox(&store, &pool, &chain, index).await.unwrap();
        assert_eq!(lockbox.keys.len(), 2);
        assert_eq!(store.get_lockbox(&chain, index).await.unwrap(), lockbox);

        let block = store.get_block(&chain, index).await.unwrap();
        assert_eq!(block.status(), BlockStatus::ReadyToLink);
        assert_eq!(block.steganography.status, StegoStatus::Complete);
        assert_eq!(block.steganography.keys, lockbox.keys);

        let scripts = encode_keys(&lockbox.keys).unwrap();
        let tx = ChainTransaction::from_scripts("feed", scripts.iter().map(|s| s.to_hex()));
        let decoded = verify(&tx, &Artifact::from_lockbox(&lockbox).unwrap())
            .into_result()
            .unwrap();
        assert_eq!(decoded.plaintext.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_failed_grind_leaves_block_untouched() {
        let store = MemoryStore::new();
        let (chain, index) = stored_block(&store, "hello").await;
        let before = store.get_block(&chain, index).await.unwrap();

        let pool = GrindPool::new(Echo { fail: true }, GrindConfig::new().workers(1));
        let err = forge_lockbox(&store, &pool, &chain, index).await.unwrap_err();
        assert!(err.is_worker_failure());

        assert_eq!(store.get_block(&chain, index).await.unwrap(), before);
        assert!(store.get_lockbox(&chain, index).await.is_err());
    }

    #[tokio::test]
    async fn test_refuses_already_ground_block() {
        let store = MemoryStore::new();
        let (chain, index) = stored_block(&store, "hello").await;
        let pool = GrindPool::new(Echo { fail: false }, GrindConfig::new());

        forge_lockbox(&store, &pool, &chain, index).await.unwrap();
        let err = forge_lockbox(&store, &pool, &chain, index).await.unwrap_err();
        assert!(matches!(err, ObscurityError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_curve_keys_round_trip() {
        let store = MemoryStore::new();
        let (chain, index) = stored_block(&store, "hey").await;
        let block = store.get_block(&chain, index).await.unwrap();
        let difficulty = Difficulty::new(16).unwrap();

        let pool = GrindPool::new(LocalFactory::new(), GrindConfig::new().workers(2).difficulty(difficulty));
        let embedded = embed_bytes(&block).unwrap();
        let chunks = plan(&embedded, difficulty);
        let results = pool.grind(&chunks).await.unwrap();
        assert_eq!(results.len(), 2);

        let scripts = encode_outputs(&results).unwrap();
        for script in &scripts {
            assert!(k256::PublicKey::from_sec1_bytes(script.public_key()).is_ok());
        }
        let tx = ChainTransaction::from_scripts("c0ffee", scripts.iter().map(|s| s.to_hex()));
        let rebuilt = reconstruct(&tx, difficulty.chunk_bytes(), embedded.len()).unwrap();
        assert_eq!(rebuilt.bytes, block.encryption.ciphertext);

        let plaintext = obscurity_crypto::decrypt(
            &block.encryption.derivation_key,
            &rebuilt.bytes,
            &block.encryption.nonce,
            &block.encryption.tag,
        )
        .unwrap();
        assert_eq!(plaintext, b"hey");

        let lockbox = forge_lockbox(&store, &pool, &chain, index).await.unwrap();
        let forged = encode_keys(&lockbox.keys).unwrap();
        let tx = ChainTransaction::from_scripts("beef", forged.iter().map(|s| s.to_hex()));
        let decoded = verify(&tx, &Artifact::from_lockbox(&lockbox).unwrap())
            .into_result()
            .unwrap();
        assert_eq!(decoded.plaintext.as_deref(), Some(&b"hey"[..]));
    }
}
