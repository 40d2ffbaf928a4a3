//! The fixed account-age predicate over one transaction slot

use chain_client::TransactionRecord;
use ethers_core::types::{Address, H256, U256};
use halo2_base::{
    gates::{GateInstructions, RangeInstructions},
    utils::ScalarField,
    AssignedValue, Context,
};
use serde::{Deserialize, Serialize};

use crate::budget::ResourceBudget;
use crate::convert::address_to_field;
use crate::input::{CircuitInput, TransactionSlot};
use crate::{CircuitError, Result};

/// Hedgehog Quick Deposit periphery contract on mainnet
pub const DEFAULT_HEDGEHOG_ADDRESS: &str = "0x468363E262999046BAFC5EA954768920ee349358";

/// Default inclusive block cutoff for the account-age claim
pub const DEFAULT_CUTOFF_BLOCK: u64 = 17_021_883;

/// Predicate constants injected into the circuit definition
///
/// These are process-wide configuration, not circuit logic. Any change
/// produces a different constraint system, so they are part of the circuit
/// fingerprint the artifact store keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Address the transaction must have been sent to
    pub hedgehog_address: Address,
    /// Inclusive upper bound on the mined block number
    pub cutoff_block: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            hedgehog_address: DEFAULT_HEDGEHOG_ADDRESS
                .parse()
                .expect("default hedgehog address is valid hex"),
            cutoff_block: DEFAULT_CUTOFF_BLOCK,
        }
    }
}

/// The public outputs the proof attests to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicOutputs {
    /// Sender of the qualifying transaction
    pub sender: Address,
    /// Block the transaction was mined in
    pub block_number: u64,
}

impl PublicOutputs {
    /// Instance column values in circuit order: sender address, then the
    /// block number as a 64-bit unsigned output.
    pub fn to_instances<F: ScalarField>(&self) -> Vec<F> {
        vec![address_to_field(&self.sender), F::from(self.block_number)]
    }
}

/// The account-age predicate circuit
///
/// Asserts, over a single budgeted transaction slot:
///
/// 1. `slot.to == config.hedgehog_address`
/// 2. `slot.block_number <= config.cutoff_block`
///
/// and exposes `(slot.from, slot.block_number)` as public outputs. The whole
/// predicate costs one constant-equality assertion plus one range-checked
/// comparison, so proving cost stays bounded by exactly one transaction's
/// worth of witness data.
#[derive(Debug, Clone, Default)]
pub struct PredicateCircuit {
    config: CircuitConfig,
}

impl PredicateCircuit {
    pub fn new(config: CircuitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Declare the fixed resource budget: no receipts, no storage slots,
    /// exactly one transaction.
    pub const fn allocate() -> ResourceBudget {
        ResourceBudget::new(0, 0, 1)
    }

    /// A satisfiable input used for key generation
    ///
    /// Keygen only needs some assignment with the right shape; this one is
    /// the boundary case (recipient matches, mined exactly at the cutoff).
    pub fn keygen_input(&self) -> CircuitInput {
        let record = TransactionRecord {
            hash: H256::zero(),
            chain_id: 1,
            block_number: self.config.cutoff_block,
            nonce: 0,
            gas_tip_cap_or_price: U256::zero(),
            gas_fee_cap: U256::zero(),
            gas_limit: 0,
            from: Address::zero(),
            to: self.config.hedgehog_address,
            value: U256::zero(),
        };
        let mut input = CircuitInput::new(Self::allocate());
        input
            .add_transaction(&record)
            .expect("budget admits one transaction");
        input
    }

    /// Native mirror of the in-circuit constraints
    ///
    /// Run before synthesis so an unsatisfiable record surfaces as a
    /// [`CircuitError::ConstraintViolation`] instead of an opaque prover
    /// failure. The returned outputs are exactly what the circuit exposes.
    pub fn check_satisfiable(&self, input: &CircuitInput) -> Result<PublicOutputs> {
        if input.live_transactions() == 0 {
            return Err(CircuitError::InputConstruction(
                "no transaction bound to the input".to_string(),
            ));
        }
        let slot = input.transaction(0)?;

        if slot.to != self.config.hedgehog_address {
            return Err(CircuitError::ConstraintViolation(format!(
                "recipient {:?} is not the Hedgehog contract {:?}",
                slot.to, self.config.hedgehog_address
            )));
        }
        if slot.block_number > self.config.cutoff_block {
            return Err(CircuitError::ConstraintViolation(format!(
                "block {} is after the cutoff {}",
                slot.block_number, self.config.cutoff_block
            )));
        }

        tracing::debug!(
            sender = ?slot.from,
            block = slot.block_number,
            "predicate satisfied natively"
        );
        Ok(PublicOutputs { sender: slot.from, block_number: slot.block_number })
    }

    /// Build the constraint system over the bound transaction slot
    ///
    /// Returns the assigned public output cells `[sender, block_number]`;
    /// the caller wires them into the instance column.
    pub fn synthesize_with_context<F: ScalarField>(
        &self,
        ctx: &mut Context<F>,
        range: &impl RangeInstructions<F>,
        input: &CircuitInput,
    ) -> Result<[AssignedValue<F>; 2]> {
        let slot = input.transaction(0)?;
        let gate = range.gate();

        let loaded = load_slot(ctx, slot);

        // Main predicate checks
        gate.assert_is_const(
            ctx,
            &loaded.to,
            &address_to_field(&self.config.hedgehog_address),
        );
        range.check_less_than_safe(ctx, loaded.block_number, self.config.cutoff_block + 1);

        Ok([loaded.from, loaded.block_number])
    }
}

/// Assigned cells for one transaction slot
struct LoadedSlot<F: ScalarField> {
    block_number: AssignedValue<F>,
    from: AssignedValue<F>,
    to: AssignedValue<F>,
}

/// Load every slot field as a private witness
///
/// Fields outside the predicate are still assigned so the witness shape is
/// identical for every proof of this circuit.
fn load_slot<F: ScalarField>(ctx: &mut Context<F>, slot: &TransactionSlot) -> LoadedSlot<F> {
    for limb in slot
        .hash
        .iter()
        .chain(&slot.gas_tip_cap_or_price)
        .chain(&slot.gas_fee_cap)
        .chain(&slot.value)
    {
        ctx.load_witness(F::from(*limb));
    }
    ctx.load_witness(F::from(slot.chain_id));
    ctx.load_witness(F::from(slot.nonce));
    ctx.load_witness(F::from(slot.gas_limit));

    let block_number = ctx.load_witness(F::from(slot.block_number));
    let from = ctx.load_witness(address_to_field(&slot.from));
    let to = ctx.load_witness(address_to_field(&slot.to));

    LoadedSlot { block_number, from, to }
}
