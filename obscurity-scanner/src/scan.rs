//! Recent-block chain scan and single-transaction verification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use obscurity_core::constants::DEFAULT_SCAN_LOOKBACK;
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{BlockStore, NodeRpc};
use obscurity_core::types::{Block, BlockStatus, ChainTransaction};
use obscurity_stego::{verify, Artifact, Decoded, VerifyOutcome};

use crate::index::PendingIndex;

/// Statuses a block may be confirmed from.
const CONFIRMABLE: [BlockStatus; 2] = [BlockStatus::ReadyToLink, BlockStatus::Linked];

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Scan configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Number of blocks to scan, counting back from the tip
    pub lookback: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_SCAN_LOOKBACK,
        }
    }
}

impl ScanConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many recent blocks each pass covers.
    pub fn lookback(mut self, blocks: u64) -> Self {
        self.lookback = blocks;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A block confirmed on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Local chain id
    pub chain_id: String,
    /// Local block index
    pub block_index: u64,
    /// Carrying transaction
    pub txid: String,
}

/// What one scan pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Height of the tip when the pass started
    pub tip_height: Option<u64>,
    /// Chain blocks examined
    pub blocks_scanned: u64,
    /// Transactions examined
    pub transactions: u64,
    /// First-key matches that went to full verification
    pub candidates: u64,
    /// Candidates that failed verification
    pub rejected: u64,
    /// Blocks confirmed during the pass
    pub verified: Vec<Confirmation>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Scans recent chain blocks for pending artifacts.
pub struct ChainScanner {
    rpc: Arc<dyn NodeRpc>,
    store: Arc<dyn BlockStore>,
    config: ScanConfig,
}

impl ChainScanner {
    /// Creates a scanner.
    pub fn new(rpc: Arc<dyn NodeRpc>, store: Arc<dyn BlockStore>, config: ScanConfig) -> Self {
        Self { rpc, store, config }
    }

    /// Scanner configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scans the last `lookback` blocks for transactions carrying a pending
    /// artifact.
    ///
    /// Confirmed blocks are moved to `verified` in the store and dropped from
    /// `index`. Failing to reach the tip is an error; failing on an
    /// individual height is logged and that height skipped.
    #[instrument(skip_all, fields(pending = index.len(), lookback = self.config.lookback))]
    pub async fn scan_recent(&self, index: &PendingIndex) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        if index.is_empty() {
            debug!("Nothing pending, skipping scan");
            return Ok(summary);
        }

        let best = self.rpc.best_block_hash().await?;
        let tip = self.rpc.block_height(&best).await?;
        summary.tip_height = Some(tip);

        let lowest = (tip + 1).saturating_sub(self.config.lookback);
        for height in (lowest..=tip).rev() {
            if index.is_empty() {
                break;
            }
            let txs = match self.fetch_height(height).await {
                Ok(txs) => txs,
                Err(e) => {
                    warn!(height, error = %e, "Skipping unreadable block");
                    continue;
                }
            };
            summary.blocks_scanned += 1;

            for tx in &txs {
                summary.transactions += 1;
                self.check_transaction(tx, index, &mut summary).await;
            }
        }

        info!(
            tip,
            blocks = summary.blocks_scanned,
            transactions = summary.transactions,
            candidates = summary.candidates,
            verified = summary.verified.len(),
            "Scan pass complete"
        );
        Ok(summary)
    }

    async fn fetch_height(&self, height: u64) -> Result<Vec<ChainTransaction>> {
        let hash = self.rpc.block_hash(height).await?;
        self.rpc.block_transactions(&hash).await
    }

    async fn check_transaction(&self, tx: &ChainTransaction, index: &PendingIndex, summary: &mut ScanSummary) {
        for artifact in index.match_transaction(tx) {
            summary.candidates += 1;
            debug!(txid = %tx.txid, chain = %artifact.chain_id, index = artifact.block_index, "First key matched");

            match verify(tx, &artifact) {
                VerifyOutcome::Verified(_) => {
                    match self.mark_verified(&artifact, &tx.txid).await {
                        Ok(recorded) => {
                            index.remove(&artifact.chain_id, artifact.block_index);
                            if recorded {
                                summary.verified.push(Confirmation {
                                    chain_id: artifact.chain_id.clone(),
                                    block_index: artifact.block_index,
                                    txid: tx.txid.clone(),
                                });
                            }
                        }
                        Err(e) => warn!(
                            chain = %artifact.chain_id,
                            index = artifact.block_index,
                            error = %e,
                            "Could not record confirmation"
                        ),
                    }
                }
                VerifyOutcome::Insufficient { needed, found } => {
                    summary.rejected += 1;
                    debug!(txid = %tx.txid, needed, found, "Candidate too short");
                }
                VerifyOutcome::Rejected(e) => {
                    summary.rejected += 1;
                    debug!(txid = %tx.txid, error = %e, "Candidate failed verification");
                }
            }
        }
    }

    /// Records a confirmation. Returns false if the block already left the
    /// pending states, e.g. confirmed by a concurrent `verify`.
    async fn mark_verified(&self, artifact: &Artifact, txid: &str) -> Result<bool> {
        let outcome = self
            .store
            .transition_status(
                &artifact.chain_id,
                artifact.block_index,
                &CONFIRMABLE,
                BlockStatus::Verified,
                Some(txid.to_string()),
            )
            .await;

        match outcome {
            Ok(_) => {
                info!(chain = %artifact.chain_id, index = artifact.block_index, txid, "Block verified on chain");
                Ok(true)
            }
            Err(ObscurityError::InvalidTransition { from, .. }) => {
                debug!(chain = %artifact.chain_id, index = artifact.block_index, %from, "Block no longer pending");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetches `txid` and checks it against `artifact`. Does not touch storage.
#[instrument(skip(rpc, artifact), fields(chain = %artifact.chain_id, index = artifact.block_index))]
pub async fn verify_transaction<R: NodeRpc + ?Sized>(
    rpc: &R,
    txid: &str,
    artifact: &Artifact,
) -> Result<VerifyOutcome> {
    let tx = rpc.raw_transaction(txid).await?;
    let outcome = verify(&tx, artifact);
    debug!(verified = outcome.is_verified(), "Checked transaction");
    Ok(outcome)
}

/// Verifies that `txid` carries the stored block and marks it `verified`.
///
/// Returns the decode; an unconfirmed block is left as it was.
#[instrument(skip(rpc, store))]
pub async fn confirm_block<R, S>(
    rpc: &R,
    store: &S,
    chain_id: &str,
    block_index: u64,
    txid: &str,
) -> Result<Decoded>
where
    R: NodeRpc + ?Sized,
    S: BlockStore + ?Sized,
{
    let block = store.get_block(chain_id, block_index).await?;
    if !CONFIRMABLE.contains(&block.status()) {
        return Err(ObscurityError::InvalidTransition {
            index: block_index,
            from: block.status().to_string(),
            to: BlockStatus::Verified.to_string(),
        });
    }

    let artifact = Artifact::from_block(&block)?;
    let decoded = verify_transaction(rpc, txid, &artifact).await?.into_result()?;

    store
        .transition_status(
            chain_id,
            block_index,
            &CONFIRMABLE,
            BlockStatus::Verified,
            Some(txid.to_string()),
        )
        .await?;

    info!(outputs = decoded.outputs_used.len(), "Block verified");
    Ok(decoded)
}

/// Checks that `txid` carries a stored, ground block without changing it.
///
/// Works in any status once keys are recorded, including `verified`.
#[instrument(skip(rpc, store))]
pub async fn recheck_block<R, S>(
    rpc: &R,
    store: &S,
    chain_id: &str,
    block_index: u64,
    txid: &str,
) -> Result<Decoded>
where
    R: NodeRpc + ?Sized,
    S: BlockStore + ?Sized,
{
    let block = store.get_block(chain_id, block_index).await?;
    let artifact = Artifact::from_block(&block)?;
    verify_transaction(rpc, txid, &artifact).await?.into_result()
}

/// Attaches a candidate transaction id to a ground block.
#[instrument(skip(store))]
pub async fn link_block<S: BlockStore + ?Sized>(
    store: &S,
    chain_id: &str,
    block_index: u64,
    txid: &str,
) -> Result<Block> {
    let txid = txid.trim();
    if txid.is_empty() {
        return Err(ObscurityError::ValidationError("txid is empty".into()));
    }
    let block = store
        .transition_status(
            chain_id,
            block_index,
            &[BlockStatus::ReadyToLink],
            BlockStatus::Linked,
            Some(txid.to_string()),
        )
        .await?;
    info!(txid, "Block linked");
    Ok(block)
}
