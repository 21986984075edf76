//! # Obscurity Core
//!
//! Core types, errors, and traits for committing encrypted payloads to a
//! public chain as ground pay-to-pubkey keys.
//!
//! This crate provides the foundational building blocks used by all other
//! Obscurity crates:
//!
//! - **Types**: Blocks, lockboxes, grind targets/results, chain transactions
//! - **Errors**: One error taxonomy with codec / worker / chain-data classes
//! - **Constants**: Protocol sizes, script bytes, difficulty bounds
//! - **Traits**: Collaborator seams (key search, node RPC, block storage)
//!
//! ## Example
//!
//! ```rust
//! use obscurity_core::{Difficulty, GrindTarget};
//!
//! let difficulty = Difficulty::new(32).unwrap();
//! let target = GrindTarget::new(0, vec![0x68, 0x65, 0x6c, 0x6c]);
//! assert_eq!(difficulty.chunk_bytes(), 4);
//! assert_eq!(target.as_hex(), "68656c6c");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ObscurityError, Result};
pub use traits::*;
pub use types::*;
