//! Domain types for Obscurity.
//!
//! - [`Difficulty`]: validated grind difficulty (bits per key)
//! - [`EncryptedPayload`]: AES-GCM ciphertext with its nonce and tag
//! - [`Block`]: a committed block with header, content and steganography records
//! - [`Lockbox`]: the durable, ready-to-broadcast encoding of one block
//! - [`GrindTarget`] / [`GrindResult`]: one chunk on its way through the grinder
//! - [`ChainTransaction`]: the part of a node transaction the scanner reads

mod difficulty;
mod payload;
mod block;
mod lockbox;
mod grind;
mod chain;

pub use difficulty::*;
pub use payload::*;
pub use block::*;
pub use lockbox::*;
pub use grind::*;
pub use chain::*;
