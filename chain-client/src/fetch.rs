//! Transaction fetch and normalization
//!
//! This module retrieves a transaction and its receipt over JSON-RPC and
//! folds them into a [`TransactionRecord`].

use ethers_core::types::{SignatureError, Transaction, TransactionReceipt, H256, U256};
use ethers_providers::{JsonRpcClient, Middleware, Provider};
use thiserror::Error;

use crate::record::TransactionRecord;
use crate::Result;

/// EIP-1559 fee-market transaction type
const EIP1559_TX_TYPE: u64 = 2;

/// Errors from fetching or normalizing chain data
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transaction or receipt could not be retrieved. The caller may
    /// retry once the transaction is mined or the RPC endpoint recovers.
    #[error("chain data unavailable for {hash:?}: {reason}")]
    DataUnavailable { hash: H256, reason: String },

    /// The transaction is a contract creation and carries no recipient.
    #[error("transaction {0:?} has no recipient (contract creation)")]
    MissingRecipient(H256),

    /// The sender could not be recovered from the transaction signature.
    #[error("failed to recover sender of {hash:?}")]
    SenderRecovery {
        hash: H256,
        #[source]
        source: SignatureError,
    },
}

/// Fetch a transaction and its receipt, and normalize them into a record
///
/// Fails with [`FetchError::DataUnavailable`] if either object cannot be
/// retrieved (unknown hash, not yet mined, RPC failure). The error is
/// surfaced as-is; retrying is the caller's decision.
pub async fn fetch_transaction_record<P: JsonRpcClient>(
    provider: &Provider<P>,
    hash: H256,
) -> Result<TransactionRecord> {
    tracing::info!(tx = %format!("{hash:#x}"), "Fetching transaction");

    let tx = provider
        .get_transaction(hash)
        .await
        .map_err(|e| FetchError::DataUnavailable { hash, reason: e.to_string() })?
        .ok_or_else(|| FetchError::DataUnavailable {
            hash,
            reason: "transaction not found".to_string(),
        })?;

    let receipt = provider
        .get_transaction_receipt(hash)
        .await
        .map_err(|e| FetchError::DataUnavailable { hash, reason: e.to_string() })?
        .ok_or_else(|| FetchError::DataUnavailable {
            hash,
            reason: "receipt not found (transaction may not be mined yet)".to_string(),
        })?;

    normalize(&tx, &receipt)
}

/// Normalize a fetched transaction + receipt pair into a [`TransactionRecord`]
///
/// Recovers the sender from the signature and selects the gas fields by
/// transaction kind. Pure with respect to the network, so it is directly
/// testable against constructed transactions.
pub fn normalize(tx: &Transaction, receipt: &TransactionReceipt) -> Result<TransactionRecord> {
    let hash = tx.hash;

    let to = tx.to.ok_or(FetchError::MissingRecipient(hash))?;

    let block_number = receipt
        .block_number
        .ok_or_else(|| FetchError::DataUnavailable {
            hash,
            reason: "receipt has no block number".to_string(),
        })?
        .as_u64();

    let from = tx
        .recover_from()
        .map_err(|source| FetchError::SenderRecovery { hash, source })?;

    let (gas_tip_cap_or_price, gas_fee_cap) = select_gas_fields(tx)?;

    let record = TransactionRecord {
        hash,
        chain_id: effective_chain_id(tx),
        block_number,
        nonce: tx.nonce.as_u64(),
        gas_tip_cap_or_price,
        gas_fee_cap,
        gas_limit: tx.gas.as_u64(),
        from,
        to,
        value: tx.value,
    };

    tracing::debug!(
        block = record.block_number,
        from = ?record.from,
        to = ?record.to,
        legacy = record.is_legacy(),
        "Normalized transaction record"
    );

    Ok(record)
}

/// Select the (tip-or-price, fee-cap) pair by transaction kind
///
/// Fee-market (type 2) transactions report their tip cap and fee cap
/// independently. Everything else carries a single gas price, which lands in
/// the tip-or-price slot with the fee cap zeroed.
pub fn select_gas_fields(tx: &Transaction) -> Result<(U256, U256)> {
    match tx.transaction_type.map(|t| t.as_u64()) {
        Some(EIP1559_TX_TYPE) => {
            let tip = tx
                .max_priority_fee_per_gas
                .ok_or_else(|| FetchError::DataUnavailable {
                    hash: tx.hash,
                    reason: "fee-market transaction missing maxPriorityFeePerGas".to_string(),
                })?;
            let cap = tx.max_fee_per_gas.ok_or_else(|| FetchError::DataUnavailable {
                hash: tx.hash,
                reason: "fee-market transaction missing maxFeePerGas".to_string(),
            })?;
            Ok((tip, cap))
        }
        _ => {
            let price = tx.gas_price.ok_or_else(|| FetchError::DataUnavailable {
                hash: tx.hash,
                reason: "transaction missing gasPrice".to_string(),
            })?;
            Ok((price, U256::zero()))
        }
    }
}

/// Chain id the transaction was signed for
///
/// Typed transactions carry it explicitly. Legacy EIP-155 signatures encode
/// it in `v`; pre-EIP-155 signatures (v = 27/28) map to 0.
fn effective_chain_id(tx: &Transaction) -> u64 {
    if let Some(id) = tx.chain_id {
        return id.as_u64();
    }
    let v = tx.v.as_u64();
    if v >= 35 {
        (v - 35) / 2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Address, U64};

    fn legacy_tx() -> Transaction {
        Transaction {
            hash: H256::from_low_u64_be(0xabc),
            nonce: 7u64.into(),
            gas: 21_000u64.into(),
            gas_price: Some(U256::from(30_000_000_000u64)),
            to: Some(Address::from_low_u64_be(0x468363)),
            value: U256::from(1_000_000u64),
            v: U64::from(37u64), // EIP-155, chain id 1
            ..Default::default()
        }
    }

    fn fee_market_tx() -> Transaction {
        Transaction {
            hash: H256::from_low_u64_be(0xdef),
            nonce: 9u64.into(),
            gas: 50_000u64.into(),
            max_priority_fee_per_gas: Some(U256::from(2_000_000_000u64)),
            max_fee_per_gas: Some(U256::from(40_000_000_000u64)),
            transaction_type: Some(U64::from(2u64)),
            chain_id: Some(U256::from(1u64)),
            to: Some(Address::from_low_u64_be(0x468363)),
            value: U256::zero(),
            ..Default::default()
        }
    }

    fn receipt_at_block(n: u64) -> TransactionReceipt {
        TransactionReceipt {
            block_number: Some(U64::from(n)),
            ..Default::default()
        }
    }

    #[test]
    fn test_legacy_gas_maps_price_with_zero_fee_cap() {
        let (tip_or_price, fee_cap) = select_gas_fields(&legacy_tx()).unwrap();
        assert_eq!(tip_or_price, U256::from(30_000_000_000u64));
        assert!(fee_cap.is_zero());
    }

    #[test]
    fn test_fee_market_gas_maps_both_fields() {
        let (tip, cap) = select_gas_fields(&fee_market_tx()).unwrap();
        assert_eq!(tip, U256::from(2_000_000_000u64));
        assert_eq!(cap, U256::from(40_000_000_000u64));
    }

    #[test]
    fn test_fee_market_missing_tip_is_unavailable() {
        let mut tx = fee_market_tx();
        tx.max_priority_fee_per_gas = None;
        let err = select_gas_fields(&tx).unwrap_err();
        assert!(matches!(err, FetchError::DataUnavailable { .. }));
    }

    #[test]
    fn test_contract_creation_rejected() {
        let mut tx = legacy_tx();
        tx.to = None;
        let err = normalize(&tx, &receipt_at_block(17_000_000)).unwrap_err();
        assert!(matches!(err, FetchError::MissingRecipient(_)));
    }

    #[test]
    fn test_unmined_receipt_rejected() {
        let tx = legacy_tx();
        let receipt = TransactionReceipt::default();
        let err = normalize(&tx, &receipt).unwrap_err();
        assert!(matches!(err, FetchError::DataUnavailable { .. }));
    }

    #[test]
    fn test_garbage_signature_fails_recovery() {
        // A fabricated transaction has a zero signature; recovery must fail
        // rather than produce some arbitrary sender.
        let tx = legacy_tx();
        let err = normalize(&tx, &receipt_at_block(17_000_000)).unwrap_err();
        assert!(matches!(err, FetchError::SenderRecovery { .. }));
    }

    #[test]
    fn test_chain_id_from_legacy_v() {
        let tx = legacy_tx();
        assert_eq!(effective_chain_id(&tx), 1);

        let mut pre155 = legacy_tx();
        pre155.v = U64::from(27u64);
        assert_eq!(effective_chain_id(&pre155), 0);

        let typed = fee_market_tx();
        assert_eq!(effective_chain_id(&typed), 1);
    }
}
