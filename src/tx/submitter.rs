//! Transaction submission with nonce-race retry
//!
//! A submission fetches the sender's nonce and the network gas price in
//! parallel, signs, and sends. When another transaction from the same
//! sender lands first, the node rejects ours with "nonce too low"; the
//! submitter retries with the base nonce plus the attempt count, without
//! re-fetching, up to a bounded number of attempts.

use super::{signer, TxRequest};
use crate::config::SubmitterConfig;
use crate::error::{CourierError, CourierResult};
use crate::rpc::RpcClient;

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signs and submits transactions to the node
pub struct TransactionSubmitter {
    rpc: Arc<dyn RpcClient>,
    config: SubmitterConfig,
    chain_id: u64,
}

impl TransactionSubmitter {
    /// Create a new transaction submitter
    pub fn new(rpc: Arc<dyn RpcClient>, config: SubmitterConfig, chain_id: u64) -> Self {
        Self {
            rpc,
            config,
            chain_id,
        }
    }

    /// Submit a transaction, returning its hash.
    ///
    /// Retries only on a nonce collision, reusing the already-fetched base
    /// nonce offset by the attempt count. After `max_nonce_retries` extra
    /// attempts the underlying error is surfaced.
    pub async fn submit(&self, request: &TxRequest, private_key: &str) -> CourierResult<H256> {
        let gas_limit = self.resolve_gas_limit(request).await?;

        // Independent reads, issued concurrently to shorten the window in
        // which the fetched nonce can go stale
        let (base_nonce, gas_price) = tokio::try_join!(
            self.rpc.transaction_count(request.from),
            self.rpc.gas_price()
        )?;
        let base_nonce = base_nonce.as_u64();

        debug!(
            from = ?request.from,
            base_nonce,
            %gas_price,
            %gas_limit,
            "Submitting transaction"
        );

        let mut attempt: u32 = 0;
        loop {
            let nonce = base_nonce + u64::from(attempt);
            let raw = signer::sign(
                request,
                nonce,
                gas_price,
                gas_limit,
                private_key,
                self.chain_id,
            )?;

            match self.rpc.send_raw_transaction(raw).await {
                Ok(tx_hash) => {
                    info!(
                        ?tx_hash,
                        nonce,
                        attempt = attempt + 1,
                        "Transaction submitted"
                    );
                    crate::metrics::record_submission();
                    return Ok(tx_hash);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_nonce_retries => {
                    warn!(nonce, error = %e, "Nonce already consumed, retrying with next nonce");
                    crate::metrics::record_nonce_retry();
                    attempt += 1;
                }
                Err(CourierError::NonceConflict { .. }) => {
                    crate::metrics::record_submission_failure();
                    return Err(CourierError::NonceConflict { nonce });
                }
                Err(e) => {
                    crate::metrics::record_submission_failure();
                    return Err(e);
                }
            }
        }
    }

    /// Resolve the gas limit: request override, then configured fixed
    /// limit, then a node-side estimate.
    async fn resolve_gas_limit(&self, request: &TxRequest) -> CourierResult<U256> {
        if let Some(limit) = request.gas_limit {
            return Ok(limit);
        }
        if let Some(limit) = self.config.fixed_gas_limit {
            return Ok(U256::from(limit));
        }

        let mut tx = TransactionRequest::new()
            .from(request.from)
            .data(request.data.clone());
        if let Some(to) = request.to {
            tx = tx.to(to);
        }
        self.rpc.estimate_gas(&TypedTransaction::Legacy(tx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockRpcClient;
    use crate::tx::tests::{test_key, test_request};
    use ethers::utils::rlp::Rlp;

    fn submitter_config() -> SubmitterConfig {
        SubmitterConfig {
            fixed_gas_limit: None,
            max_nonce_retries: 3,
        }
    }

    fn mock_with_reads(base_nonce: u64) -> MockRpcClient {
        let mut rpc = MockRpcClient::new();
        rpc.expect_transaction_count()
            .returning(move |_| Ok(U256::from(base_nonce)));
        rpc.expect_gas_price()
            .returning(|| Ok(U256::from(20_000_000_000u64)));
        rpc.expect_estimate_gas()
            .returning(|_| Ok(U256::from(100_000u64)));
        rpc
    }

    /// Decode the nonce out of a signed legacy transaction (first RLP field)
    fn decoded_nonce(raw: &Bytes) -> u64 {
        let rlp = Rlp::new(raw.as_ref());
        rlp.val_at::<u64>(0).unwrap()
    }

    #[tokio::test]
    async fn test_submit_uses_fetched_nonce() {
        let mut rpc = mock_with_reads(42);
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|raw| {
                assert_eq!(decoded_nonce(&raw), 42);
                Ok(H256::repeat_byte(0xab))
            });

        let submitter = TransactionSubmitter::new(Arc::new(rpc), submitter_config(), 1);
        let hash = submitter.submit(&test_request(), test_key()).await.unwrap();
        assert_eq!(hash, H256::repeat_byte(0xab));
    }

    #[tokio::test]
    async fn test_nonce_conflict_retries_with_incremented_nonce() {
        let mut rpc = mock_with_reads(10);
        let mut calls = 0u32;
        rpc.expect_send_raw_transaction()
            .times(3)
            .returning(move |raw| {
                assert_eq!(decoded_nonce(&raw), 10 + u64::from(calls));
                calls += 1;
                if calls < 3 {
                    Err(CourierError::NonceConflict { nonce: 0 })
                } else {
                    Ok(H256::repeat_byte(0x01))
                }
            });

        let submitter = TransactionSubmitter::new(Arc::new(rpc), submitter_config(), 1);
        let hash = submitter.submit(&test_request(), test_key()).await.unwrap();
        assert_eq!(hash, H256::repeat_byte(0x01));
    }

    #[tokio::test]
    async fn test_persistent_nonce_conflict_stops_after_four_attempts() {
        let mut rpc = mock_with_reads(5);
        rpc.expect_send_raw_transaction()
            .times(4)
            .returning(|_| Err(CourierError::NonceConflict { nonce: 0 }));

        let submitter = TransactionSubmitter::new(Arc::new(rpc), submitter_config(), 1);
        let err = submitter
            .submit(&test_request(), test_key())
            .await
            .unwrap_err();

        // The surfaced error names the nonce of the final attempt
        assert!(matches!(err, CourierError::NonceConflict { nonce: 8 }));
    }

    #[tokio::test]
    async fn test_other_rejections_are_not_retried() {
        let mut rpc = mock_with_reads(0);
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|_| Err(CourierError::Submission("insufficient funds".to_string())));

        let submitter = TransactionSubmitter::new(Arc::new(rpc), submitter_config(), 1);
        let err = submitter
            .submit(&test_request(), test_key())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Submission(_)));
    }

    #[tokio::test]
    async fn test_fixed_gas_limit_skips_estimation() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_transaction_count()
            .returning(|_| Ok(U256::zero()));
        rpc.expect_gas_price().returning(|| Ok(U256::one()));
        // No expect_estimate_gas: any estimate call fails the test
        rpc.expect_send_raw_transaction()
            .returning(|_| Ok(H256::zero()));

        let config = SubmitterConfig {
            fixed_gas_limit: Some(200_000),
            max_nonce_retries: 3,
        };
        let submitter = TransactionSubmitter::new(Arc::new(rpc), config, 1);
        submitter.submit(&test_request(), test_key()).await.unwrap();
    }
}
