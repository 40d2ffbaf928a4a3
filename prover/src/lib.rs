//! Prover - Orchestration layer for account-age proof generation
//!
//! This crate connects chain data fetching, the predicate circuit, and the
//! verification gateway into a high-level pipeline: compile the circuit
//! into durable artifacts, prove that a transaction satisfies the
//! account-age predicate, submit the proof, and wait for the on-chain
//! callback.
//!
//! The flow mirrors the two CLI commands:
//!
//! * `compile` — [`artifact::compile`] generates and caches the SRS,
//!   proving/verifying keys, and circuit pinning.
//! * `prove` — [`pipeline::ProofPipeline::run`] drives one transaction from
//!   fetched record to finalized callback.

pub mod artifact;
pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod prove;
pub mod request;
pub mod witness;

pub use artifact::{ArtifactConfig, ArtifactError, CompiledArtifact};
pub use config::AppConfig;
pub use gateway::{HttpGateway, PollConfig, ProofGateway, QueryStatus, WaitError};
pub use pipeline::{PipelineError, PipelineOutcome, PipelineStage, ProofPipeline};
pub use prove::{Proof, ProveError};
pub use request::{RequestError, RequestParams, SubmissionRequest, PROOF_VERSION};
pub use witness::Witness;
