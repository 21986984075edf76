//! Protocol constants for Obscurity.
//!
//! Script byte layout follows the compressed pay-to-pubkey form:
//! `OP_PUSHBYTES_33 <33-byte pubkey> OP_CHECKSIG`.

// ═══════════════════════════════════════════════════════════════════════════════
// CIPHER CODEC (AES-256-GCM)
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of the symmetric key derived from a passphrase.
pub const CIPHER_KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Algorithm label persisted alongside every encrypted payload.
pub const CIPHER_ALGO: &str = "AES-256-GCM";

// ═══════════════════════════════════════════════════════════════════════════════
// SCRAMBLE CODEC
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a block hash in bytes (SHA-256 output).
pub const BLOCK_HASH_SIZE: usize = 32;

/// Size of the random salt mixed into a scramble mask.
pub const SCRAMBLE_SALT_SIZE: usize = 4;

/// Protocol tag prepended to every scramble mask preimage.
pub const SCRAMBLE_PROTOCOL_TAG: &[u8] = b"OBSCURITY_SCRAMBLE";

/// Version byte mixed into the scramble mask preimage.
pub const SCRAMBLE_VERSION: u8 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC KEYS & SCRIPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a compressed secp256k1 public key (prefix byte + X coordinate).
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Size of the X coordinate carried by a compressed public key.
pub const PUBKEY_X_SIZE: usize = 32;

/// Push opcode for exactly 33 bytes; first byte of a compressed P2PK script.
pub const OP_PUSHBYTES_33: u8 = 0x21;

/// `OP_CHECKSIG`; last byte of a P2PK script.
pub const OP_CHECKSIG: u8 = 0xac;

/// Size of a compressed P2PK script in bytes (1 + 33 + 1).
pub const P2PK_SCRIPT_SIZE: usize = 1 + COMPRESSED_PUBKEY_SIZE + 1;

/// Length of a compressed P2PK script in hex characters.
pub const P2PK_SCRIPT_HEX_LEN: usize = P2PK_SCRIPT_SIZE * 2;

// ═══════════════════════════════════════════════════════════════════════════════
// GRINDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Smallest accepted difficulty in bits.
pub const MIN_DIFFICULTY_BITS: u16 = 16;

/// Largest accepted difficulty in bits (the whole X coordinate).
pub const MAX_DIFFICULTY_BITS: u16 = (PUBKEY_X_SIZE * 8) as u16;

/// Default difficulty in bits (4 bytes per key).
pub const DEFAULT_DIFFICULTY_BITS: u16 = 32;

/// Minimum width of a grind target on the wire, in hex characters.
pub const MIN_TARGET_HEX_LEN: usize = 8;

/// Default number of concurrent grind workers.
pub const DEFAULT_WORKERS: usize = 4;

/// First argument selecting the key-search binary's streaming mode.
pub const GRINDER_STREAM_MODE: &str = "grind_stream";

/// Line sent to a key-search process to ask it to exit.
pub const GRINDER_QUIT: &str = "quit";

/// Locations probed for the key-search binary when none is configured.
pub const GRINDER_BINARY_CANDIDATES: &[&str] = &[
    "./xgrind_gpu",
    "./xgrind/xgrind_gpu",
    "../xgrind/xgrind_gpu",
];

/// Engine label recorded in a block's steganography record.
pub const STEGO_ENGINE: &str = "xgrind";

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKS & ARTIFACTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `prev_hash` used by anchor blocks.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Current lockbox format version.
pub const LOCKBOX_VERSION: u32 = 1;

/// Length of generated chain identifiers, in hex characters.
pub const CHAIN_ID_LEN: usize = 8;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default interval between background scans, in seconds.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Default number of recent blocks inspected per scan.
pub const DEFAULT_SCAN_LOOKBACK: u64 = 3;

/// Granularity at which a sleeping watcher checks its stop flag, in milliseconds.
pub const STOP_POLL_INTERVAL_MS: u64 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sizes() {
        assert_eq!(P2PK_SCRIPT_SIZE, 35);
        assert_eq!(P2PK_SCRIPT_HEX_LEN, 70);
    }

    #[test]
    fn test_difficulty_bounds() {
        assert_eq!(MIN_DIFFICULTY_BITS % 8, 0);
        assert_eq!(MAX_DIFFICULTY_BITS, 256);
        assert!(DEFAULT_DIFFICULTY_BITS >= MIN_DIFFICULTY_BITS);
        assert!(DEFAULT_DIFFICULTY_BITS <= MAX_DIFFICULTY_BITS);
    }

    #[test]
    fn test_genesis_prev_hash_width() {
        assert_eq!(GENESIS_PREV_HASH.len(), BLOCK_HASH_SIZE * 2);
        assert!(GENESIS_PREV_HASH.chars().all(|c| c == '0'));
    }
}
