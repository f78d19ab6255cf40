//! Error types for txcourier

use ethers::types::H256;
use thiserror::Error;

/// Main error type for submission and tracking operations
#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Nonce conflict at nonce {nonce}: node reports nonce too low")]
    NonceConflict { nonce: u64 },

    #[error("Submission rejected by node: {0}")]
    Submission(String),

    #[error("Transaction {tx_hash:?} not propagated to node after {elapsed_ms} ms")]
    NotPropagated { tx_hash: H256, elapsed_ms: u64 },

    #[error("Transaction {tx_hash:?} not mined within {elapsed_ms} ms")]
    TrackingTimeout { tx_hash: H256, elapsed_ms: u64 },
}

impl CourierError {
    /// Check if error is recoverable by a local retry.
    ///
    /// Only a nonce collision is retried (with a bumped nonce); every other
    /// failure is surfaced to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CourierError::NonceConflict { .. })
    }
}

/// Result type for courier operations
pub type CourierResult<T> = Result<T, CourierError>;
