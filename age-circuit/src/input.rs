//! Per-proof circuit input with budget-shaped padding

use chain_client::TransactionRecord;
use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::budget::ResourceBudget;
use crate::convert::{h256_to_limbs, u256_to_limbs};
use crate::{CircuitError, Result};

/// Field-ready witness data for one transaction slot
///
/// 256-bit quantities are carried as four little-endian u64 limbs so every
/// value loads into the scalar field without overflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSlot {
    pub hash: [u64; 4],
    pub chain_id: u64,
    pub block_number: u64,
    pub nonce: u64,
    pub gas_tip_cap_or_price: [u64; 4],
    pub gas_fee_cap: [u64; 4],
    pub gas_limit: u64,
    pub from: Address,
    pub to: Address,
    pub value: [u64; 4],
}

impl From<&TransactionRecord> for TransactionSlot {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            hash: h256_to_limbs(&record.hash),
            chain_id: record.chain_id,
            block_number: record.block_number,
            nonce: record.nonce,
            gas_tip_cap_or_price: u256_to_limbs(&record.gas_tip_cap_or_price),
            gas_fee_cap: u256_to_limbs(&record.gas_fee_cap),
            gas_limit: record.gas_limit,
            from: record.from,
            to: record.to,
            value: u256_to_limbs(&record.value),
        }
    }
}

/// Budget-padded input for a single proof request
///
/// Acts as an arena with exactly `max_transactions` slots: live records are
/// bound in order and the remainder is zero padding. Transient; built fresh
/// for each proof request and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitInput {
    budget: ResourceBudget,
    transactions: Vec<TransactionSlot>,
}

impl CircuitInput {
    /// Create an empty input for the given budget
    pub fn new(budget: ResourceBudget) -> Self {
        Self { budget, transactions: Vec::new() }
    }

    /// Bind one transaction record to the next free slot
    ///
    /// Fails with [`CircuitError::BudgetExceeded`] once all budgeted slots
    /// are taken.
    pub fn add_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        if self.transactions.len() >= self.budget.max_transactions {
            return Err(CircuitError::BudgetExceeded {
                kind: "transaction",
                max: self.budget.max_transactions,
            });
        }
        self.transactions.push(TransactionSlot::from(record));
        Ok(())
    }

    /// Number of live (non-padding) transaction slots
    pub fn live_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// The declared budget this input was shaped for
    pub fn budget(&self) -> ResourceBudget {
        self.budget
    }

    /// Live slot at `idx`, or an error if only padding is there
    ///
    /// The constraint system references slots by index; referencing a slot
    /// that was never bound is an input construction bug, not a padding
    /// read, so it is rejected rather than silently zero-filled.
    pub fn transaction(&self, idx: usize) -> Result<&TransactionSlot> {
        self.transactions.get(idx).ok_or_else(|| {
            CircuitError::InputConstruction(format!(
                "transaction slot {idx} referenced but only {} bound",
                self.transactions.len()
            ))
        })
    }

    /// All slots padded out to the budgeted capacity
    pub fn padded_transactions(&self) -> Vec<TransactionSlot> {
        let mut slots = self.transactions.clone();
        slots.resize(self.budget.max_transactions, TransactionSlot::default());
        slots
    }
}
