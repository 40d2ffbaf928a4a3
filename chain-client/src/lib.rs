//! Chain Client - Transaction record retrieval for proof generation
//!
//! This crate wraps an Ethereum JSON-RPC provider to fetch a transaction and
//! its receipt, and normalizes them into a single canonical
//! [`TransactionRecord`] consumed by the proof pipeline.
//!
//! # Overview
//!
//! Normalization does three things beyond raw retrieval:
//!
//! * Recovers the sender address from the transaction signature and chain id
//!   instead of trusting the node-reported `from` field.
//! * Selects the gas price fields by transaction kind: legacy transactions
//!   map their single gas price into the tip-or-price slot with the fee cap
//!   zeroed, while fee-market (EIP-1559) transactions populate both fields.
//! * Rejects contract-creation transactions, which carry no recipient and
//!   can never satisfy the recipient predicate.
//!
//! # Usage
//!
//! ```no_run
//! use chain_client::fetch_transaction_record;
//! use ethers_providers::{Http, Provider};
//!
//! # async fn example() -> chain_client::Result<()> {
//! let provider = Provider::<Http>::try_from("https://gateway.tenderly.co/public/mainnet")
//!     .expect("invalid rpc url");
//! let hash = "0x6dc5c1ae7d8d35e4f74ff2f4e6fa1ab0cfcbaa716d0bab84994b3b6183b02785"
//!     .parse()
//!     .unwrap();
//! let record = fetch_transaction_record(&provider, hash).await?;
//! println!("sender {:?} mined at block {}", record.from, record.block_number);
//! # Ok(())
//! # }
//! ```

pub mod fetch;
pub mod record;

pub use fetch::{fetch_transaction_record, normalize, FetchError};
pub use record::TransactionRecord;

/// Result type for chain client operations
pub type Result<T> = std::result::Result<T, FetchError>;
