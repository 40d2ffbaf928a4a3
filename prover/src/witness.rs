//! Witness generation for the account-age predicate
//!
//! Bridges a normalized transaction record into the circuit input shape and
//! checks the predicate natively before any proving work is spent on an
//! unsatisfiable assignment.

use age_circuit::{CircuitError, CircuitInput, PredicateCircuit, PublicOutputs};
use chain_client::TransactionRecord;
use halo2_base::halo2_proofs::halo2curves::bn256::Fr;

/// A checked witness: circuit input plus the public outputs it produces
#[derive(Debug, Clone)]
pub struct Witness {
    input: CircuitInput,
    public_outputs: PublicOutputs,
}

impl Witness {
    /// Build and check the witness for one transaction record
    ///
    /// Fails with [`CircuitError::ConstraintViolation`] when the record does
    /// not satisfy the predicate; this is the expected rejection path for
    /// ineligible transactions.
    pub fn generate(
        circuit: &PredicateCircuit,
        record: &TransactionRecord,
    ) -> Result<Self, CircuitError> {
        let mut input = CircuitInput::new(PredicateCircuit::allocate());
        input.add_transaction(record)?;
        let public_outputs = circuit.check_satisfiable(&input)?;

        tracing::debug!(
            sender = ?public_outputs.sender,
            block = public_outputs.block_number,
            "witness checked against the predicate"
        );
        Ok(Self { input, public_outputs })
    }

    pub fn input(&self) -> &CircuitInput {
        &self.input
    }

    pub fn public_outputs(&self) -> &PublicOutputs {
        &self.public_outputs
    }

    /// Instance column values in circuit order
    pub fn instances(&self) -> Vec<Fr> {
        self.public_outputs.to_instances()
    }
}
