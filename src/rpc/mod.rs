//! JSON-RPC client abstraction over a remote EVM node
//!
//! The `RpcClient` trait is the seam between the submission/tracking core
//! and the node. The production implementation (`NodeClient`) wraps one or
//! more HTTP providers with round-robin failover; tests substitute a mock.

use crate::error::{CourierError, CourierResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Interface to a remote node, safe for concurrent in-flight requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Current transaction count ("nonce") of an account
    async fn transaction_count(&self, address: Address) -> CourierResult<U256>;

    /// Current network gas price
    async fn gas_price(&self) -> CourierResult<U256>;

    /// Gas estimate for a call described by `tx`
    async fn estimate_gas(&self, tx: &TypedTransaction) -> CourierResult<U256>;

    /// Submit a signed, RLP-encoded transaction; returns its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> CourierResult<H256>;

    /// Execute a read-only call, optionally pinned to a block
    async fn call(&self, tx: &TypedTransaction, block: Option<BlockId>) -> CourierResult<Bytes>;

    /// Receipt of a mined transaction, absent until mined
    async fn transaction_receipt(&self, hash: H256) -> CourierResult<Option<TransactionReceipt>>;

    /// Transaction record by hash, absent if the node has never seen it
    async fn transaction_by_hash(&self, hash: H256) -> CourierResult<Option<Transaction>>;
}

/// Multi-provider node client with automatic failover
pub struct NodeClient {
    /// HTTP providers (multiple for failover)
    providers: Vec<Provider<Http>>,
    /// Current active provider index
    current: AtomicUsize,
}

impl NodeClient {
    /// Create a new node client from a list of RPC URLs
    pub fn new(rpc_urls: &[String]) -> CourierResult<Self> {
        let mut providers = Vec::new();

        for url in rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    providers.push(provider);
                    debug!("Added HTTP provider: {}", url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if providers.is_empty() {
            return Err(CourierError::Config("No valid RPC providers".to_string()));
        }

        Ok(Self {
            providers,
            current: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current.load(Ordering::Relaxed);
        &self.providers[idx % self.providers.len()]
    }

    /// Switch to the next available provider
    fn failover(&self) {
        let current = self.current.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current.store(next, Ordering::Relaxed);
        warn!("RPC failover to provider {}", next);
    }

    /// Liveness probe used by the readiness endpoint
    pub async fn health_check(&self) -> bool {
        match self.http().get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Node health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl RpcClient for NodeClient {
    async fn transaction_count(&self, address: Address) -> CourierResult<U256> {
        for _ in 0..self.providers.len() {
            match self.http().get_transaction_count(address, None).await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    warn!("Failed to get transaction count: {}", e);
                    self.failover();
                }
            }
        }
        Err(CourierError::Rpc("All providers failed".to_string()))
    }

    async fn gas_price(&self) -> CourierResult<U256> {
        for _ in 0..self.providers.len() {
            match self.http().get_gas_price().await {
                Ok(price) => return Ok(price),
                Err(e) => {
                    warn!("Failed to get gas price: {}", e);
                    self.failover();
                }
            }
        }
        Err(CourierError::Rpc("All providers failed".to_string()))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> CourierResult<U256> {
        self.http()
            .estimate_gas(tx, None)
            .await
            .map_err(|e| CourierError::Rpc(format!("Gas estimation failed: {}", e)))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> CourierResult<H256> {
        match self.http().send_raw_transaction(raw).await {
            Ok(pending) => Ok(pending.tx_hash()),
            Err(e) => Err(classify_send_error(&e.to_string())),
        }
    }

    async fn call(&self, tx: &TypedTransaction, block: Option<BlockId>) -> CourierResult<Bytes> {
        self.http()
            .call(tx, block)
            .await
            .map_err(|e| CourierError::Rpc(e.to_string()))
    }

    async fn transaction_receipt(&self, hash: H256) -> CourierResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| CourierError::Rpc(e.to_string()))
    }

    async fn transaction_by_hash(&self, hash: H256) -> CourierResult<Option<Transaction>> {
        self.http()
            .get_transaction(hash)
            .await
            .map_err(|e| CourierError::Rpc(e.to_string()))
    }
}

/// Map a node rejection message to an error variant.
///
/// The nonce race is the only condition the submitter recovers from, so it
/// gets its own variant; everything else is a plain rejection.
fn classify_send_error(message: &str) -> CourierError {
    if message.contains("nonce too low") || message.contains("invalid nonce") {
        // The submitter fills in the nonce it used for the attempt
        CourierError::NonceConflict { nonce: 0 }
    } else {
        CourierError::Submission(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_rejection_is_classified_as_conflict() {
        let err = classify_send_error("rpc error: nonce too low");
        assert!(err.is_retryable());

        let err = classify_send_error("invalid nonce: expected 7, got 5");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_rejections_are_not_retryable() {
        let err = classify_send_error("insufficient funds for gas * price + value");
        assert!(!err.is_retryable());
        assert!(matches!(err, CourierError::Submission(_)));
    }
}
