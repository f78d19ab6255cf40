//! Receipt tracking with elapsed-time-aware escalation
//!
//! Polls the node for a receipt at a fixed interval. Between 60 and 70
//! seconds of waiting, a single diagnostic probe asks the node whether it
//! has any record of the transaction; a transaction the node has never
//! seen is reported as not propagated rather than merely slow. Tracking is
//! abandoned after a one hour ceiling.

use crate::config::TrackerConfig;
use crate::error::{CourierError, CourierResult};
use crate::rpc::RpcClient;

use ethers::types::{TransactionReceipt, H256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Lower edge of the propagation probe window, exclusive
const PROPAGATION_PROBE_AFTER_MS: u64 = 60_000;
/// Upper edge of the propagation probe window, inclusive
const PROPAGATION_PROBE_UNTIL_MS: u64 = 70_000;

/// Polls for transaction receipts until mined or timed out
pub struct ReceiptTracker {
    rpc: Arc<dyn RpcClient>,
    poll_interval: Duration,
    timeout_ms: u64,
}

impl ReceiptTracker {
    /// Create a new receipt tracker
    pub fn new(rpc: Arc<dyn RpcClient>, config: &TrackerConfig) -> Self {
        Self {
            rpc,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Block until the transaction is mined, returning its receipt.
    ///
    /// Suspends only the calling task; concurrent tracking operations each
    /// carry their own elapsed/attempt counters and proceed independently.
    /// Never returns a receipt without a resolved status field.
    pub async fn wait_for_receipt(&self, tx_hash: H256) -> CourierResult<TransactionReceipt> {
        let mut elapsed_ms: u64 = 0;
        let mut attempts: u32 = 0;
        let mut probed = false;

        loop {
            attempts += 1;

            if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                if receipt.status.is_some() {
                    debug!(?tx_hash, elapsed_ms, attempts, "Receipt resolved");
                    crate::metrics::observe_confirmation(elapsed_ms);
                    return Ok(receipt);
                }
                // Receipt visible but execution status not yet resolved;
                // keep polling as if absent
                warn!(?tx_hash, "Receipt present without status, still waiting");
            }

            if elapsed_ms > self.timeout_ms {
                warn!(?tx_hash, elapsed_ms, attempts, "Tracking timed out");
                return Err(CourierError::TrackingTimeout { tx_hash, elapsed_ms });
            }

            if !probed
                && elapsed_ms > PROPAGATION_PROBE_AFTER_MS
                && elapsed_ms <= PROPAGATION_PROBE_UNTIL_MS
            {
                probed = true;
                if self.rpc.transaction_by_hash(tx_hash).await?.is_none() {
                    warn!(?tx_hash, elapsed_ms, "Node has no record of transaction");
                    return Err(CourierError::NotPropagated { tx_hash, elapsed_ms });
                }
                debug!(?tx_hash, "Transaction known to node, still pending");
            }

            tokio::time::sleep(self.poll_interval).await;
            elapsed_ms += self.poll_interval.as_millis() as u64;
        }
    }
}
