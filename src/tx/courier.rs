//! Composition of submitter, tracker, and classifier

use super::{classify, extract_revert_reason, Outcome, ReceiptTracker, TransactionSubmitter, TxRequest};
use crate::config::Settings;
use crate::error::{CourierError, CourierResult};
use crate::rpc::RpcClient;

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Point-in-time view of a transaction's state
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub outcome: Outcome,
    /// Revert reason recovered by replaying the call, when available
    pub reason: Option<String>,
}

/// Submits transactions and tracks them to a terminal outcome
pub struct Courier {
    rpc: Arc<dyn RpcClient>,
    submitter: TransactionSubmitter,
    tracker: ReceiptTracker,
    /// Hex-encoded signing key, wiped on drop
    private_key: Zeroizing<String>,
    /// Address derived from the signing key
    sender: Address,
}

impl Courier {
    /// Create a new courier, loading the signing key from the environment
    pub fn new(rpc: Arc<dyn RpcClient>, settings: &Settings) -> CourierResult<Self> {
        let private_key = settings
            .wallet
            .private_key()
            .map_err(|e| CourierError::Config(e.to_string()))?;

        let sender = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| CourierError::InvalidKey(e.to_string()))?
            .address();

        info!(?sender, "Courier initialized");

        Ok(Self {
            submitter: TransactionSubmitter::new(
                rpc.clone(),
                settings.submitter.clone(),
                settings.node.chain_id,
            ),
            tracker: ReceiptTracker::new(rpc.clone(), &settings.tracker),
            rpc,
            private_key,
            sender,
        })
    }

    /// Address transactions are sent from
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Submit a transaction, returning its hash
    pub async fn submit(&self, request: &TxRequest) -> CourierResult<H256> {
        self.submitter.submit(request, &self.private_key).await
    }

    /// Block until the transaction is mined
    pub async fn wait_for_receipt(&self, tx_hash: H256) -> CourierResult<TransactionReceipt> {
        self.tracker.wait_for_receipt(tx_hash).await
    }

    /// Submit and block until mined, returning the receipt
    pub async fn submit_and_track(&self, request: &TxRequest) -> CourierResult<TransactionReceipt> {
        let tx_hash = self.submit(request).await?;
        let receipt = self.wait_for_receipt(tx_hash).await?;

        let record = self.rpc.transaction_by_hash(tx_hash).await?;
        let outcome = classify(Some(&receipt), record.as_ref());
        // The tracker only returns receipts with a resolved status
        debug_assert!(outcome.is_terminal());
        crate::metrics::record_outcome(outcome);
        info!(?tx_hash, outcome = outcome.label(), "Transaction tracked to completion");

        Ok(receipt)
    }

    /// Point-in-time, non-blocking status of a transaction
    pub async fn status(&self, tx_hash: H256) -> CourierResult<StatusReport> {
        let (receipt, record) = tokio::try_join!(
            self.rpc.transaction_receipt(tx_hash),
            self.rpc.transaction_by_hash(tx_hash)
        )?;

        let outcome = classify(receipt.as_ref(), record.as_ref());
        let reason = match (outcome, receipt.as_ref(), record.as_ref()) {
            (Outcome::Reverted, Some(receipt), Some(record)) => {
                self.revert_reason(receipt, record).await
            }
            _ => None,
        };

        Ok(StatusReport { outcome, reason })
    }

    /// Replay a reverted call at the block it was mined in to recover the
    /// node's revert reason. Best effort: a replay that no longer reverts
    /// yields no reason.
    async fn revert_reason(
        &self,
        receipt: &TransactionReceipt,
        record: &Transaction,
    ) -> Option<String> {
        let mut tx = TransactionRequest::new()
            .from(record.from)
            .data(record.input.clone())
            .gas(record.gas)
            .value(record.value);
        if let Some(to) = record.to {
            tx = tx.to(to);
        }
        let block = receipt.block_number.map(|n| BlockId::from(n.as_u64()));

        match self.rpc.call(&TypedTransaction::Legacy(tx), block).await {
            Ok(_) => None,
            Err(e) => Some(extract_revert_reason(&e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ApiConfig, MetricsConfig, NodeConfig, SubmitterConfig, TrackerConfig, WalletConfig,
    };
    use crate::rpc::MockRpcClient;
    use crate::tx::tests::{test_key, test_request};
    use ethers::types::U64;

    fn test_settings() -> Settings {
        std::env::set_var("COURIER_TEST_KEY", test_key());
        Settings {
            node: NodeConfig {
                rpc_urls: vec!["http://localhost:8545".to_string()],
                chain_id: 1,
            },
            submitter: SubmitterConfig {
                fixed_gas_limit: Some(100_000),
                max_nonce_retries: 3,
            },
            tracker: TrackerConfig::default(),
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            metrics: MetricsConfig {
                enabled: false,
                port: 0,
            },
            wallet: WalletConfig {
                private_key_env: "COURIER_TEST_KEY".to_string(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_track_returns_resolved_receipt() {
        let mut rpc = MockRpcClient::new();
        let hash = H256::repeat_byte(0x77);

        rpc.expect_transaction_count()
            .returning(|_| Ok(U256::zero()));
        rpc.expect_gas_price().returning(|| Ok(U256::one()));
        rpc.expect_send_raw_transaction()
            .returning(move |_| Ok(hash));
        rpc.expect_transaction_receipt().returning(|_| {
            Ok(Some(TransactionReceipt {
                status: Some(U64::one()),
                ..Default::default()
            }))
        });
        rpc.expect_transaction_by_hash()
            .returning(|_| Ok(Some(Transaction::default())));

        let courier = Courier::new(Arc::new(rpc), &test_settings()).unwrap();
        let receipt = courier.submit_and_track(&test_request()).await.unwrap();
        assert_eq!(receipt.status, Some(U64::one()));
    }

    #[tokio::test]
    async fn test_status_is_non_blocking_classification() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_transaction_receipt().returning(|_| Ok(None));
        rpc.expect_transaction_by_hash()
            .returning(|_| Ok(Some(Transaction::default())));

        let courier = Courier::new(Arc::new(rpc), &test_settings()).unwrap();
        let report = courier.status(H256::repeat_byte(0x88)).await.unwrap();
        assert_eq!(report.outcome, Outcome::Pending);
        // No replay for non-terminal outcomes (any call would panic the mock)
        assert_eq!(report.reason, None);
    }

    #[tokio::test]
    async fn test_reverted_status_carries_replayed_reason() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_transaction_receipt().returning(|_| {
            Ok(Some(TransactionReceipt {
                status: Some(U64::zero()),
                gas_used: Some(U256::from(30_000)),
                block_number: Some(U64::from(100)),
                ..Default::default()
            }))
        });
        rpc.expect_transaction_by_hash().returning(|_| {
            Ok(Some(Transaction {
                gas: U256::from(90_000),
                ..Default::default()
            }))
        });
        rpc.expect_call().times(1).returning(|_, block| {
            assert_eq!(block, Some(BlockId::from(100u64)));
            Err(CourierError::Rpc(
                "execution reverted: Not job arbiter".to_string(),
            ))
        });

        let courier = Courier::new(Arc::new(rpc), &test_settings()).unwrap();
        let report = courier.status(H256::repeat_byte(0x99)).await.unwrap();
        assert_eq!(report.outcome, Outcome::Reverted);
        assert_eq!(report.reason.as_deref(), Some("Not job arbiter"));
    }

    #[tokio::test]
    async fn test_sender_is_derived_from_key() {
        let rpc = MockRpcClient::new();
        let courier = Courier::new(Arc::new(rpc), &test_settings()).unwrap();
        assert_eq!(courier.sender(), test_request().from);
    }
}
