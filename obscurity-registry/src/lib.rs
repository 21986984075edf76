//! # Obscurity Registry
//!
//! Durable storage for chains, blocks and lockboxes.
//!
//! This crate provides two storage backends:
//!
//! - **Memory**: fast in-memory storage for tests and one-shot runs
//! - **File**: one JSON document per chain, block and lockbox under a data directory
//!
//! Both apply block updates atomically, so a grind finishing and a scan
//! confirming the same block cannot interleave their status writes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use obscurity_registry::{append_block, create_anchor, FileStore};
//!
//! let store = FileStore::open("./obscurity_data").await?;
//! let chain = create_anchor(&store, "notes").await?;
//! let block = append_block(&store, &chain.id, payload, &params).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chain;
mod file;
mod memory;

pub use chain::{append_block, create_anchor, fork_chain, new_chain_id};
pub use file::FileStore;
pub use memory::MemoryStore;

// Re-export the trait from core
pub use obscurity_core::traits::BlockStore;
