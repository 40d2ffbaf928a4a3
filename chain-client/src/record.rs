//! Canonical transaction record consumed by the proof pipeline

use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Normalized view of one mined transaction
///
/// Built once by the normalizer and then read-only: the proof pipeline never
/// mutates a record. The recipient is always present because contract
/// creations are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash
    pub hash: H256,
    /// Chain id the transaction was signed for (0 for pre-EIP-155 signatures)
    pub chain_id: u64,
    /// Block the transaction was mined in, taken from the receipt
    pub block_number: u64,
    /// Sender account nonce
    pub nonce: u64,
    /// Gas tip cap for fee-market transactions, or the full gas price for
    /// legacy transactions
    pub gas_tip_cap_or_price: U256,
    /// Gas fee cap; zero for legacy transactions
    pub gas_fee_cap: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Sender, recovered from the signature
    pub from: Address,
    /// Recipient contract or account
    pub to: Address,
    /// Transferred value in wei
    pub value: U256,
}

impl TransactionRecord {
    /// Whether the record was signed as a legacy (single gas price) transaction
    pub fn is_legacy(&self) -> bool {
        self.gas_fee_cap.is_zero()
    }
}
