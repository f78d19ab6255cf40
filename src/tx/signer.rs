//! Offline transaction signing
//!
//! Pure: given identical inputs the only variation is the signature
//! randomness permitted by ECDSA. The wallet built from the key lives for
//! the duration of one call and is dropped on return.

use super::TxRequest;
use crate::error::{CourierError, CourierResult};

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;

/// Sign a transaction payload, producing the RLP-encoded raw transaction
/// ready for `eth_sendRawTransaction`.
pub fn sign(
    request: &TxRequest,
    nonce: u64,
    gas_price: U256,
    gas_limit: U256,
    private_key: &str,
    chain_id: u64,
) -> CourierResult<Bytes> {
    let wallet = private_key
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| CourierError::InvalidKey(e.to_string()))?
        .with_chain_id(chain_id);

    if wallet.address() != request.from {
        return Err(CourierError::Encoding(format!(
            "Sender {:?} does not match signing key address {:?}",
            request.from,
            wallet.address()
        )));
    }

    let mut tx = TransactionRequest::new()
        .from(request.from)
        .data(request.data.clone())
        .nonce(nonce)
        .gas(gas_limit)
        .gas_price(gas_price)
        .chain_id(chain_id);

    // Contract creation when `to` is absent
    if let Some(to) = request.to {
        tx = tx.to(to);
    }

    let typed_tx = TypedTransaction::Legacy(tx);
    let signature = wallet
        .sign_transaction_sync(&typed_tx)
        .map_err(|e| CourierError::Encoding(e.to_string()))?;

    Ok(typed_tx.rlp_signed(&signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::tests::{test_key, test_request};

    #[test]
    fn test_sign_produces_raw_transaction() {
        let request = test_request();
        let raw = sign(
            &request,
            7,
            U256::from(20_000_000_000u64),
            U256::from(100_000u64),
            test_key(),
            11155111,
        )
        .unwrap();
        assert!(!raw.is_empty());
    }

    #[test]
    fn test_nonce_changes_signed_payload() {
        let request = test_request();
        let gas_price = U256::from(20_000_000_000u64);
        let gas_limit = U256::from(100_000u64);

        let a = sign(&request, 1, gas_price, gas_limit, test_key(), 1).unwrap();
        let b = sign(&request, 2, gas_price, gas_limit, test_key(), 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let err = sign(
            &test_request(),
            0,
            U256::one(),
            U256::one(),
            "not-a-key",
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CourierError::InvalidKey(_)));
    }

    #[test]
    fn test_sender_mismatch_is_rejected() {
        let mut request = test_request();
        request.from = Address::random();

        let err = sign(
            &request,
            0,
            U256::one(),
            U256::one(),
            test_key(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CourierError::Encoding(_)));
    }
}
