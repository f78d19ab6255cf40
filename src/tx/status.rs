//! Terminal-outcome classification
//!
//! Maps a (receipt, transaction record) pair fetched at a single point in
//! time into a user-facing status. Pure; the courier performs the lookups.

use ethers::types::{Transaction, TransactionReceipt, U64};
use serde::Serialize;

/// User-facing transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The node has no record of the transaction
    NotReached,
    /// Known to the node but not yet mined (or mined without a resolved
    /// status), or receipt lacks an execution status
    Pending,
    /// Execution failed before exhausting its gas allowance
    Reverted,
    /// Execution failed having consumed the entire gas allowance
    OutOfGas,
    /// Executed successfully
    Success,
}

impl Outcome {
    /// Terminal outcomes end tracking; the others are point-in-time
    /// snapshots.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Reverted | Outcome::OutOfGas | Outcome::Success)
    }

    /// Stable label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NotReached => "not_reached",
            Outcome::Pending => "pending",
            Outcome::Reverted => "reverted",
            Outcome::OutOfGas => "out_of_gas",
            Outcome::Success => "success",
        }
    }
}

/// Classify a transaction's state from already-fetched node data.
///
/// A failed receipt whose gas consumption equals the transaction's gas
/// limit is taken as out-of-gas; any other failure is a revert.
pub fn classify(receipt: Option<&TransactionReceipt>, record: Option<&Transaction>) -> Outcome {
    let receipt = match receipt {
        Some(receipt) => receipt,
        None => {
            return match record {
                Some(_) => Outcome::Pending,
                None => Outcome::NotReached,
            }
        }
    };

    match receipt.status {
        Some(status) if status == U64::one() => Outcome::Success,
        Some(_) => {
            let exhausted = match (receipt.gas_used, record) {
                (Some(gas_used), Some(record)) => gas_used == record.gas,
                _ => false,
            };
            if exhausted {
                Outcome::OutOfGas
            } else {
                Outcome::Reverted
            }
        }
        // A receipt without a status field is never treated as terminal
        None => Outcome::Pending,
    }
}

/// Extract a human-readable revert reason from a node error message.
///
/// Nodes phrase replay failures as "execution reverted: <reason>"; when the
/// message carries no reason payload the bare phrase is returned, and an
/// unrelated message is passed through as-is.
pub fn extract_revert_reason(message: &str) -> String {
    match message.find("execution reverted") {
        Some(idx) => {
            let rest = &message[idx + "execution reverted".len()..];
            let reason = rest.trim_start_matches(':').trim();
            if reason.is_empty() {
                "execution reverted".to_string()
            } else {
                reason.to_string()
            }
        }
        None => message.trim().to_string(),
    }
}
