//! End-to-end proving pipeline
//!
//! Drives one transaction claim from fetched record to an on-chain callback:
//! input construction, witness checking, proving, local verification,
//! request preparation, gateway submission, and finality polling. The
//! pipeline tracks the stage it last completed so callers and logs can tell
//! exactly how far a run got.

use std::path::Path;
use std::sync::Arc;

use age_circuit::{CircuitError, PredicateCircuit};
use chain_client::TransactionRecord;
use ethers_core::types::H256;
use thiserror::Error;
use tokio::sync::watch;

use crate::artifact::CompiledArtifact;
use crate::gateway::{self, PollConfig, ProofGateway, WaitError};
use crate::prove::{self, Proof, ProveError};
use crate::request::{self, RequestError, RequestParams, SubmissionRequest};
use crate::witness::Witness;

/// Stage the pipeline last completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    InputBuilt,
    WitnessGenerated,
    Proved,
    LocallyVerified,
    RequestPrepared,
    Submitted,
    Polling,
    Finalized,
    TimedOut,
    Failed,
}

/// Why a pipeline run stopped short of finalization
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The transaction could not be mapped into the circuit input shape.
    #[error("input construction: {0}")]
    InputConstruction(String),

    /// The transaction is ineligible; this is the expected rejection path.
    #[error("predicate not satisfied: {0}")]
    ConstraintViolation(String),

    /// The proving backend failed.
    #[error("proving: {0}")]
    Proving(String),

    /// Our own proof failed our own verification; nothing was submitted.
    #[error("local verification: {0}")]
    LocalVerification(String),

    /// The submission request could not be prepared.
    #[error("request preparation")]
    RequestPreparation(#[from] RequestError),

    /// The gateway rejected the submission or was unreachable.
    #[error("gateway submission")]
    Submission(#[from] gateway::GatewayError),

    /// Finality polling was cancelled by the caller.
    #[error("cancelled while awaiting finality")]
    Cancelled,

    /// The gateway never reported finality within the deadline.
    #[error("timed out awaiting finality")]
    TimedOut,
}

impl From<CircuitError> for PipelineError {
    fn from(e: CircuitError) -> Self {
        match e {
            CircuitError::ConstraintViolation(msg) => Self::ConstraintViolation(msg),
            other => Self::InputConstruction(other.to_string()),
        }
    }
}

impl From<ProveError> for PipelineError {
    fn from(e: ProveError) -> Self {
        match e {
            ProveError::Verification(msg) => Self::LocalVerification(msg),
            other => Self::Proving(other.to_string()),
        }
    }
}

impl From<WaitError> for PipelineError {
    fn from(e: WaitError) -> Self {
        match e {
            WaitError::Cancelled => Self::Cancelled,
            WaitError::TimedOut(_) => Self::TimedOut,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// What a finalized run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The prepared request that was submitted
    pub request: SubmissionRequest,
    /// The generated proof
    pub proof: Proof,
    /// Hash of the callback transaction on the target chain
    pub callback_tx: H256,
}

/// One claim's journey from transaction record to on-chain callback
pub struct ProofPipeline<G> {
    circuit: PredicateCircuit,
    artifact: Arc<CompiledArtifact>,
    gateway: G,
    request_params: RequestParams,
    poll: PollConfig,
    stage: PipelineStage,
}

impl<G: ProofGateway> ProofPipeline<G> {
    pub fn new(
        circuit: PredicateCircuit,
        artifact: Arc<CompiledArtifact>,
        gateway: G,
        request_params: RequestParams,
        poll: PollConfig,
    ) -> Self {
        Self {
            circuit,
            artifact,
            gateway,
            request_params,
            poll,
            stage: PipelineStage::Idle,
        }
    }

    /// Stage the pipeline last completed
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Run the whole pipeline for one transaction record
    ///
    /// When `proof_path` is set, the proof is persisted right after local
    /// verification, before submission, so a failed or interrupted
    /// submission can be retried without proving again.
    pub async fn run(
        &mut self,
        record: &TransactionRecord,
        proof_path: Option<&Path>,
        cancel: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome> {
        let result = self.run_inner(record, proof_path, cancel).await;
        match &result {
            Ok(outcome) => {
                self.stage = PipelineStage::Finalized;
                tracing::info!(callback_tx = %outcome.callback_tx, "pipeline finalized");
            }
            Err(PipelineError::TimedOut) => {
                self.stage = PipelineStage::TimedOut;
                tracing::warn!("pipeline timed out awaiting finality");
            }
            Err(e) => {
                self.stage = PipelineStage::Failed;
                tracing::error!("pipeline failed: {e}");
            }
        }
        result
    }

    async fn run_inner(
        &mut self,
        record: &TransactionRecord,
        proof_path: Option<&Path>,
        cancel: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome> {
        let witness = self.generate_witness(record)?;
        let proof = self.generate_proof(&witness)?;
        self.verify_locally(&proof)?;

        if let Some(path) = proof_path {
            proof.write_to(path)?;
        }

        let request = self.prepare_request(&proof)?;
        self.submit(&request, &proof).await?;
        let callback_tx = self.await_finality(request.request_id, cancel).await?;

        Ok(PipelineOutcome { request, proof, callback_tx })
    }

    /// Build and check the witness for the record
    pub fn generate_witness(&mut self, record: &TransactionRecord) -> Result<Witness> {
        self.stage = PipelineStage::InputBuilt;
        let witness = Witness::generate(&self.circuit, record)?;
        self.stage = PipelineStage::WitnessGenerated;
        Ok(witness)
    }

    /// Generate the proof for a checked witness
    pub fn generate_proof(&mut self, witness: &Witness) -> Result<Proof> {
        let proof = prove::generate_proof(&self.artifact, &self.circuit, witness)?;
        self.stage = PipelineStage::Proved;
        Ok(proof)
    }

    /// Re-verify the proof against our own keys
    pub fn verify_locally(&mut self, proof: &Proof) -> Result<()> {
        prove::verify_locally(&self.artifact, proof)?;
        self.stage = PipelineStage::LocallyVerified;
        Ok(())
    }

    /// Prepare the gateway submission for the proof's claim
    pub fn prepare_request(&mut self, proof: &Proof) -> Result<SubmissionRequest> {
        let request = request::prepare_request(
            &self.artifact.vk,
            &proof.public_outputs,
            &self.request_params,
        )?;
        self.stage = PipelineStage::RequestPrepared;
        Ok(request)
    }

    /// Submit the proof to the gateway
    pub async fn submit(&mut self, request: &SubmissionRequest, proof: &Proof) -> Result<()> {
        self.gateway.submit_proof(request, proof).await?;
        self.stage = PipelineStage::Submitted;
        Ok(())
    }

    /// Poll the gateway until the callback lands, honoring cancellation
    pub async fn await_finality(
        &mut self,
        request_id: H256,
        cancel: watch::Receiver<bool>,
    ) -> Result<H256> {
        self.stage = PipelineStage::Polling;
        let tx_hash =
            gateway::wait_final_proof_submitted(&self.gateway, request_id, &self.poll, cancel)
                .await?;
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{self, ArtifactConfig};
    use crate::gateway::{GatewayError, QueryStatus};
    use crate::request::PROOF_VERSION;
    use age_circuit::predicate::DEFAULT_HEDGEHOG_ADDRESS;
    use ethers_core::types::{Address, U256};
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubGateway {
        pending_polls: Mutex<u32>,
        submitted: Mutex<Vec<H256>>,
        reject_submit: bool,
    }

    impl StubGateway {
        fn finalizing_after(pending_polls: u32) -> Self {
            Self {
                pending_polls: Mutex::new(pending_polls),
                submitted: Mutex::new(Vec::new()),
                reject_submit: false,
            }
        }

        fn rejecting() -> Self {
            Self {
                pending_polls: Mutex::new(0),
                submitted: Mutex::new(Vec::new()),
                reject_submit: true,
            }
        }
    }

    impl ProofGateway for StubGateway {
        async fn submit_proof(
            &self,
            request: &SubmissionRequest,
            _proof: &Proof,
        ) -> std::result::Result<(), GatewayError> {
            if self.reject_submit {
                return Err(GatewayError::Rejected {
                    status: 400,
                    message: "bad request".to_string(),
                });
            }
            self.submitted.lock().unwrap().push(request.request_id);
            Ok(())
        }

        async fn query_status(
            &self,
            _request_id: H256,
        ) -> std::result::Result<QueryStatus, GatewayError> {
            let mut remaining = self.pending_polls.lock().unwrap();
            if *remaining == 0 {
                Ok(QueryStatus::FinalProofSubmitted { tx_hash: H256::from_low_u64_be(0xcafe) })
            } else {
                *remaining -= 1;
                Ok(QueryStatus::Pending)
            }
        }
    }

    fn shared_artifact(name: &str) -> Arc<CompiledArtifact> {
        let root = env::temp_dir().join(format!("age_prover_pipeline_{name}"));
        let cfg = ArtifactConfig::new(11, 10, root.join("out"), root.join("srs"));
        Arc::new(artifact::compile(&PredicateCircuit::default(), &cfg).unwrap())
    }

    fn request_params() -> RequestParams {
        RequestParams {
            proof_version: PROOF_VERSION,
            target_chain_id: 11_155_111,
            refund_address: Address::from_low_u64_be(0x0164),
            callback_contract: Address::from_low_u64_be(0xef1b),
            fee_value: U256::from(30_000_000_000_000u64),
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }

    fn record(block: u64) -> TransactionRecord {
        TransactionRecord {
            hash: H256::from_low_u64_be(0x77),
            chain_id: 1,
            block_number: block,
            nonce: 1,
            gas_tip_cap_or_price: U256::from(20_000_000_000u64),
            gas_fee_cap: U256::zero(),
            gas_limit: 21_000,
            from: Address::from_low_u64_be(0x5e4d),
            to: DEFAULT_HEDGEHOG_ADDRESS.parse().unwrap(),
            value: U256::zero(),
        }
    }

    #[tokio::test]
    async fn test_full_run_finalizes() {
        let mut pipeline = ProofPipeline::new(
            PredicateCircuit::default(),
            shared_artifact("finalizes"),
            StubGateway::finalizing_after(2),
            request_params(),
            fast_poll(),
        );
        let (_tx, rx) = watch::channel(false);

        let outcome = pipeline.run(&record(17_000_000), None, rx).await.unwrap();

        assert_eq!(pipeline.stage(), PipelineStage::Finalized);
        assert_eq!(outcome.callback_tx, H256::from_low_u64_be(0xcafe));
        assert_eq!(outcome.proof.public_outputs.block_number, 17_000_000);
        assert_eq!(
            pipeline.gateway.submitted.lock().unwrap().as_slice(),
            &[outcome.request.request_id]
        );
    }

    #[tokio::test]
    async fn test_ineligible_record_fails_before_proving() {
        let mut pipeline = ProofPipeline::new(
            PredicateCircuit::default(),
            shared_artifact("ineligible"),
            StubGateway::finalizing_after(0),
            request_params(),
            fast_poll(),
        );
        let (_tx, rx) = watch::channel(false);

        // 17,100,000 is past the 17,021,883 cutoff
        let err = pipeline.run(&record(17_100_000), None, rx).await.unwrap_err();

        assert!(matches!(err, PipelineError::ConstraintViolation(_)));
        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert!(pipeline.gateway.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_pipeline() {
        let mut pipeline = ProofPipeline::new(
            PredicateCircuit::default(),
            shared_artifact("rejected"),
            StubGateway::rejecting(),
            request_params(),
            fast_poll(),
        );
        let (_tx, rx) = watch::channel(false);

        let err = pipeline.run(&record(17_000_000), None, rx).await.unwrap_err();

        assert!(matches!(err, PipelineError::Submission(_)));
        assert_eq!(pipeline.stage(), PipelineStage::Failed);
    }

    #[tokio::test]
    async fn test_proof_persisted_before_submission() {
        let path = env::temp_dir().join("age_prover_pipeline/persisted_proof.bin");
        let _ = std::fs::remove_file(&path);

        let mut pipeline = ProofPipeline::new(
            PredicateCircuit::default(),
            shared_artifact("persisted"),
            StubGateway::finalizing_after(0),
            request_params(),
            fast_poll(),
        );
        let (_tx, rx) = watch::channel(false);

        let outcome = pipeline.run(&record(17_000_000), Some(&path), rx).await.unwrap();

        let persisted = Proof::read_from(&path).unwrap();
        assert_eq!(persisted.bytes, outcome.proof.bytes);
    }

    #[tokio::test]
    async fn test_cancellation_surfaces_as_cancelled() {
        let mut pipeline = ProofPipeline::new(
            PredicateCircuit::default(),
            shared_artifact("cancelled"),
            StubGateway::finalizing_after(u32::MAX),
            request_params(),
            fast_poll(),
        );
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let err = pipeline.run(&record(17_000_000), None, rx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
