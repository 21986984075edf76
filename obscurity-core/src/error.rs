//! Error types for Obscurity.
//!
//! One error hierarchy for every crate in the workspace. Variants are grouped
//! so callers can tell a codec rejection from missing chain data or a crashed
//! grind worker without string matching.

use thiserror::Error;

/// Result type alias using `ObscurityError`.
pub type Result<T> = std::result::Result<T, ObscurityError>;

/// Main error type for all Obscurity operations.
#[derive(Debug, Error)]
pub enum ObscurityError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CODEC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Authenticated decryption rejected the ciphertext, nonce, tag or passphrase.
    #[error("Authentication failed: ciphertext does not verify under this key")]
    AuthenticationFailed,

    /// Scrambled payload does not commit to the claimed block hash.
    #[error("Scramble mismatch: payload does not encode hash {expected_hash}")]
    ScrambleMismatch { expected_hash: String },

    /// Encryption could not be performed.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Invalid nonce, tag, hash or key size.
    #[error("Invalid {what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // GRIND ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// A worker could not start its key-search session.
    #[error("Worker {worker} failed to start: {reason}")]
    WorkerSpawn { worker: usize, reason: String },

    /// A worker's key-search session died mid-request.
    #[error("Worker {worker} crashed: {reason}")]
    WorkerCrashed { worker: usize, reason: String },

    /// A worker's key-search session answered with an unparseable line.
    #[error("Worker {worker} returned malformed output: {line:?}")]
    MalformedWorkerOutput { worker: usize, line: String },

    /// A worker's key-search session did not answer in time.
    #[error("Worker {worker} timed out after {seconds}s")]
    WorkerTimeout { worker: usize, seconds: u64 },

    /// A found key does not carry the requested prefix.
    #[error("Key for chunk {chunk_index} does not match target {target}")]
    PrefixMismatch { chunk_index: usize, target: String },

    /// Not every chunk produced a key.
    #[error("Grind incomplete: {collected}/{expected} keys collected, missing chunks {missing:?}")]
    GrindIncomplete {
        expected: usize,
        collected: usize,
        missing: Vec<usize>,
    },

    /// The key-search binary could not be located.
    #[error("Key-search binary not found: {0}")]
    GrinderNotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CHAIN DATA ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Not enough matching pay-to-pubkey outputs to rebuild the payload yet.
    #[error("Insufficient chain data: need {needed} bytes, found {found}")]
    InsufficientData { needed: usize, found: usize },

    /// A transaction or block from the node could not be interpreted.
    #[error("Invalid chain data: {0}")]
    InvalidChainData(String),

    /// A script is not a compressed pay-to-pubkey script.
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    /// A public key is not a 33-byte compressed key.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Block not found.
    #[error("Block {index} not found in chain {chain_id}")]
    BlockNotFound { chain_id: String, index: u64 },

    /// Chain not found.
    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    /// Lockbox not found.
    #[error("Lockbox not found for block {index} of chain {chain_id}")]
    LockboxNotFound { chain_id: String, index: u64 },

    /// A block already exists at this position.
    #[error("Block {index} already exists in chain {chain_id}")]
    DuplicateBlock { chain_id: String, index: u64 },

    /// A status transition was refused because the block moved on.
    #[error("Invalid status transition for block {index}: {from} -> {to}")]
    InvalidTransition { index: u64, from: String, to: String },

    /// Store is corrupted or unreadable.
    #[error("Store error: {0}")]
    StoreError(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    /// Artifact format version mismatch.
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node rejected our credentials.
    #[error("RPC authentication failed")]
    RpcAuthFailed,

    /// HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Connection timeout.
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Difficulty outside the accepted range.
    #[error("Invalid difficulty {0}: must be a multiple of 8 in [16, 256]")]
    InvalidDifficulty(u16),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ObscurityError {
    /// Returns true if the payload was rebuilt but did not verify.
    pub fn is_codec_failure(&self) -> bool {
        matches!(
            self,
            ObscurityError::AuthenticationFailed | ObscurityError::ScrambleMismatch { .. }
        )
    }

    /// Returns true if a grind worker failed.
    pub fn is_worker_failure(&self) -> bool {
        matches!(
            self,
            ObscurityError::WorkerSpawn { .. }
                | ObscurityError::WorkerCrashed { .. }
                | ObscurityError::MalformedWorkerOutput { .. }
                | ObscurityError::WorkerTimeout { .. }
                | ObscurityError::PrefixMismatch { .. }
                | ObscurityError::GrindIncomplete { .. }
        )
    }

    /// Returns true if the data is simply not on chain yet (retry later).
    pub fn is_not_yet_found(&self) -> bool {
        matches!(self, ObscurityError::InsufficientData { .. })
    }

    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ObscurityError::HttpError(_)
                | ObscurityError::ConnectionTimeout(_)
                | ObscurityError::Rpc { .. }
                | ObscurityError::InsufficientData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ObscurityError::InsufficientData { needed: 32, found: 8 };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("8"));
    }

    #[test]
    fn test_error_classification() {
        assert!(ObscurityError::AuthenticationFailed.is_codec_failure());
        assert!(ObscurityError::ScrambleMismatch {
            expected_hash: "ab".into()
        }
        .is_codec_failure());
        assert!(!ObscurityError::AuthenticationFailed.is_recoverable());

        let crashed = ObscurityError::WorkerCrashed {
            worker: 1,
            reason: "eof".into(),
        };
        assert!(crashed.is_worker_failure());
        assert!(!crashed.is_codec_failure());
        assert!(!crashed.is_not_yet_found());

        let missing = ObscurityError::InsufficientData { needed: 8, found: 4 };
        assert!(missing.is_not_yet_found());
        assert!(missing.is_recoverable());
        assert!(!missing.is_codec_failure());

        assert!(ObscurityError::HttpError("refused".into()).is_recoverable());
        assert!(!ObscurityError::RpcAuthFailed.is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let converted: Result<serde_json::Value> = json_result.map_err(ObscurityError::from);
        assert!(matches!(converted, Err(ObscurityError::JsonError(_))));
    }
}
