//! Age Circuit - Arithmetic predicate over one mined transaction
//!
//! This crate defines the fixed constraint predicate the prover attests to:
//! a transaction was sent directly to the Hedgehog deposit contract and was
//! mined at or before a cutoff block. The sender address and block number
//! are exposed as public outputs; everything else about the transaction
//! stays private.
//!
//! # Overview
//!
//! * [`ResourceBudget`] — the fixed data capacity the circuit declares
//!   (one transaction slot, no receipts, no storage slots).
//! * [`CircuitInput`] — one proof request's budget-padded witness data,
//!   built from a [`chain_client::TransactionRecord`].
//! * [`PredicateCircuit`] — the constraint definition plus its
//!   configuration constants (target address, cutoff block).
//!
//! The predicate constants are configuration, not circuit logic: changing
//! either yields a different circuit with different keys, which the artifact
//! store detects through the circuit fingerprint.

pub mod budget;
pub mod convert;
pub mod input;
pub mod predicate;

pub use budget::ResourceBudget;
pub use input::{CircuitInput, TransactionSlot};
pub use predicate::{CircuitConfig, PredicateCircuit, PublicOutputs};

use thiserror::Error;

/// Errors from circuit input construction and witness checking
#[derive(Debug, Error)]
pub enum CircuitError {
    /// The record cannot be mapped into the circuit input shape.
    #[error("input construction failed: {0}")]
    InputConstruction(String),

    /// More live instances were bound than the declared budget allows.
    #[error("resource budget exceeded: at most {max} {kind} instance(s) allowed")]
    BudgetExceeded { kind: &'static str, max: usize },

    /// The transaction does not satisfy the predicate. This is the expected
    /// rejection path for ineligible transactions, not a system fault.
    #[error("transaction does not satisfy the predicate: {0}")]
    ConstraintViolation(String),
}

/// Result type for circuit operations
pub type Result<T> = std::result::Result<T, CircuitError>;
