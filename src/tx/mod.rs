//! Transaction submission and lifecycle tracking

mod courier;
mod signer;
mod status;
mod submitter;
mod tracker;

pub use courier::{Courier, StatusReport};
pub use status::{classify, extract_revert_reason, Outcome};
pub use submitter::TransactionSubmitter;
pub use tracker::ReceiptTracker;

use crate::error::{CourierError, CourierResult};
use ethers::types::{Address, Bytes, U256};

/// Immutable input to one logical submission
#[derive(Debug, Clone)]
pub struct TxRequest {
    /// Encoded calldata
    pub data: Bytes,
    /// Sender address; must match the signing key
    pub from: Address,
    /// Target address, absent for contract creation
    pub to: Option<Address>,
    /// Optional gas limit override
    pub gas_limit: Option<U256>,
}

impl TxRequest {
    /// Create a new transaction request
    pub fn new(data: impl Into<Bytes>, from: Address, to: Option<Address>) -> Self {
        Self {
            data: data.into(),
            from,
            to,
            gas_limit: None,
        }
    }

    /// Set gas limit
    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Build a request from hex-encoded wire fields, validating sizes
    pub fn from_hex(data: &str, from: Address, to: Option<&str>) -> CourierResult<Self> {
        let data = hex::decode(data.trim_start_matches("0x"))
            .map_err(|e| CourierError::Encoding(format!("Invalid calldata hex: {}", e)))?;
        let to = to.map(parse_address).transpose()?;
        Ok(Self::new(data, from, to))
    }
}

/// Parse a hex address, enforcing the 20-byte width
pub fn parse_address(input: &str) -> CourierResult<Address> {
    input
        .parse::<Address>()
        .map_err(|e| CourierError::Encoding(format!("Invalid address {:?}: {}", input, e)))
}
