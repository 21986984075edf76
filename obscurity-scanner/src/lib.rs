//! # Obscurity Scanner
//!
//! Finds committed blocks on chain and confirms them.
//!
//! ## Features
//!
//! - **Pending Index**: ground-but-unconfirmed blocks keyed by their first public key
//! - **Recent-Block Scan**: walks the last few blocks looking for those keys
//! - **Strict Verification**: a key match is only a hint; decryption or unscramble decides
//! - **Watcher**: cancellable background scan on a fixed interval
//!
//! ## Example
//!
//! ```rust,ignore
//! use obscurity_scanner::{ChainScanner, PendingIndex, ScanConfig};
//!
//! let scanner = ChainScanner::new(rpc, store.clone(), ScanConfig::default());
//! let index = PendingIndex::from_store(store.as_ref()).await?;
//! let summary = scanner.scan_recent(&index).await?;
//!
//! for hit in summary.verified {
//!     println!("block {} of {} confirmed in {}", hit.block_index, hit.chain_id, hit.txid);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod index;
pub mod scan;
pub mod watch;

pub use index::PendingIndex;
pub use scan::{
    confirm_block, link_block, recheck_block, verify_transaction, ChainScanner, Confirmation,
    ScanConfig, ScanSummary,
};
pub use watch::{spawn_watcher, ScanCallback, WatchConfig, WatchHandle};

#[cfg(test)]
pub(crate) mod testing;
