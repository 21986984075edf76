//! # Obscurity Steganography
//!
//! The byte-level half of the pipeline: turning a block's payload into
//! grind targets and pay-to-pubkey scripts, and turning chain transactions
//! back into verified payloads.
//!
//! - **Chunk**: split embedded bytes into fixed-size grind targets
//! - **Encode**: map ground keys to `21 <pubkey> ac` scripts, in chunk order
//! - **Reconstruct**: pull key prefixes back out of a transaction
//! - **Verify**: authenticate a reconstruction (decrypt or unscramble)
//! - **Commit**: build a new block from a payload
//!
//! ## Quick Start
//!
//! ```rust
//! use obscurity_core::Difficulty;
//! use obscurity_stego::plan;
//!
//! let plan = plan(b"hello", Difficulty::new(32).unwrap());
//! assert_eq!(plan.total_chunks, 2);
//! assert_eq!(plan.chunks[1], vec![b'o', 0, 0, 0]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod chunk;
pub mod commit;
pub mod encode;
pub mod reconstruct;
pub mod verify;

pub use chunk::{plan, ChunkPlan};
pub use commit::{commit_block, embed_bytes, CommitParams, Payload};
pub use encode::{encode_keys, encode_outputs, P2pkScript};
pub use reconstruct::{extract_keys, is_p2pk_script, reconstruct, Reconstruction};
pub use verify::{verify, Artifact, Decoded, VerifyOutcome};
