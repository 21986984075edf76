//! # Obscurity Cryptography
//!
//! The two payload codecs and the hashes they rest on.
//!
//! - **Cipher**: AES-256-GCM with a SHA-256 passphrase KDF
//! - **Scramble**: keyed XOR mask committing a 32-byte block hash
//! - **Hash**: SHA-256 helpers and the block-hash formula
//!
//! ## Example
//!
//! ```rust
//! use obscurity_crypto::{decrypt, encrypt};
//!
//! let payload = encrypt("a1b2c3d4", b"hello").unwrap();
//! let plain = decrypt("a1b2c3d4", &payload.ciphertext, &payload.nonce, &payload.tag).unwrap();
//! assert_eq!(plain, b"hello");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cipher;
pub mod hash;
pub mod scramble;

pub use cipher::{decrypt, derive_key, encrypt, encrypt_with_nonce, open, CipherKey};
pub use hash::{compute_block_hash, sha256, sha256_hex};
pub use scramble::{scramble, scramble_with_salt, unscramble, verify_scrambled, Scrambled};
