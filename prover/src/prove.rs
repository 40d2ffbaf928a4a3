//! Proof generation and local verification
//!
//! Runs prover-stage synthesis against the pinned circuit shape, produces a
//! SHPLONK/KZG proof, and re-verifies it locally before anything leaves the
//! process. Proofs are persisted to disk so a submission can be retried
//! without proving again.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use age_circuit::{PredicateCircuit, PublicOutputs};
use halo2_base::{
    gates::circuit::{builder::BaseCircuitBuilder, CircuitBuilderStage},
    halo2_proofs::{
        halo2curves::bn256::{Bn256, Fr, G1Affine},
        plonk::{create_proof, verify_proof},
        poly::commitment::ParamsProver,
        poly::kzg::{
            commitment::KZGCommitmentScheme,
            multiopen::{ProverSHPLONK, VerifierSHPLONK},
            strategy::SingleStrategy,
        },
        transcript::{
            Blake2bRead, Blake2bWrite, Challenge255, TranscriptReadBuffer,
            TranscriptWriterBuffer,
        },
    },
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::CompiledArtifact;
use crate::witness::Witness;

/// Errors from proof generation, verification, and persistence
#[derive(Debug, Error)]
pub enum ProveError {
    /// Prover-stage synthesis or the proving backend failed.
    #[error("proving failed: {0}")]
    Proving(String),

    /// The generated proof did not verify against our own keys. This means
    /// the prover and the artifacts disagree; submitting would waste the fee.
    #[error("local verification failed: {0}")]
    Verification(String),

    /// Filesystem failure while persisting or reading a proof.
    #[error("proof io")]
    Io(#[from] std::io::Error),

    /// Proof file could not be encoded or decoded.
    #[error("proof encoding")]
    Codec(#[from] bincode::Error),
}

/// Result type for proving operations
pub type Result<T> = std::result::Result<T, ProveError>;

/// A generated proof together with what it proves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    /// Fingerprint of the circuit the proof was generated for
    pub circuit_fingerprint: String,
    /// Public outputs bound by the proof
    pub public_outputs: PublicOutputs,
    /// Serialized SHPLONK proof bytes
    pub bytes: Vec<u8>,
}

impl Proof {
    /// Persist the proof for later resubmission
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        tracing::info!(?path, "proof written");
        Ok(())
    }

    /// Read a previously persisted proof
    pub fn read_from(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(bincode::deserialize_from(BufReader::new(file))?)
    }
}

/// Generate a proof for a checked witness
pub fn generate_proof(
    artifact: &CompiledArtifact,
    circuit: &PredicateCircuit,
    witness: &Witness,
) -> Result<Proof> {
    tracing::info!(
        sender = ?witness.public_outputs().sender,
        block = witness.public_outputs().block_number,
        "generating proof"
    );

    let mut builder = BaseCircuitBuilder::<Fr>::from_stage(CircuitBuilderStage::Prover)
        .use_params(artifact.pinning.params.clone())
        .use_break_points(artifact.pinning.break_points.clone());

    let range = builder.range_chip();
    let outputs = circuit
        .synthesize_with_context(builder.main(0), &range, witness.input())
        .map_err(|e| ProveError::Proving(e.to_string()))?;
    builder.assigned_instances[0] = outputs.to_vec();

    let instances = witness.instances();
    let mut transcript = Blake2bWrite::<_, G1Affine, Challenge255<_>>::init(vec![]);
    create_proof::<
        KZGCommitmentScheme<Bn256>,
        ProverSHPLONK<'_, Bn256>,
        Challenge255<G1Affine>,
        _,
        Blake2bWrite<Vec<u8>, G1Affine, Challenge255<G1Affine>>,
        _,
    >(
        &artifact.params,
        &artifact.pk,
        &[builder],
        &[&[instances.as_slice()]],
        OsRng,
        &mut transcript,
    )
    .map_err(|e| ProveError::Proving(e.to_string()))?;
    let bytes = transcript.finalize();

    tracing::info!(proof_len = bytes.len(), "proof generated");
    Ok(Proof {
        circuit_fingerprint: artifact.fingerprint.clone(),
        public_outputs: *witness.public_outputs(),
        bytes,
    })
}

/// Verify a proof against our own verifying key
///
/// Failure here is fatal for the pipeline: the proof would be rejected
/// downstream anyway, so nothing is submitted.
pub fn verify_locally(artifact: &CompiledArtifact, proof: &Proof) -> Result<()> {
    let instances: Vec<Fr> = proof.public_outputs.to_instances();
    let verifier_params = artifact.params.verifier_params();
    let strategy = SingleStrategy::new(&artifact.params);
    let mut transcript = Blake2bRead::<_, _, Challenge255<_>>::init(&proof.bytes[..]);

    verify_proof::<
        KZGCommitmentScheme<Bn256>,
        VerifierSHPLONK<'_, Bn256>,
        Challenge255<G1Affine>,
        Blake2bRead<&[u8], G1Affine, Challenge255<G1Affine>>,
        SingleStrategy<'_, Bn256>,
    >(
        verifier_params,
        &artifact.vk,
        strategy,
        &[&[instances.as_slice()]],
        &mut transcript,
    )
    .map_err(|e| ProveError::Verification(e.to_string()))?;

    tracing::debug!("proof verified locally");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{self, ArtifactConfig};
    use age_circuit::predicate::DEFAULT_HEDGEHOG_ADDRESS;
    use chain_client::TransactionRecord;
    use ethers_core::types::{Address, H256, U256};
    use std::env;

    fn small_artifact(name: &str) -> CompiledArtifact {
        let root = env::temp_dir().join(format!("age_prover_prove_{name}"));
        let cfg = ArtifactConfig::new(11, 10, root.join("out"), root.join("srs"));
        artifact::compile(&PredicateCircuit::default(), &cfg).unwrap()
    }

    fn eligible_record() -> TransactionRecord {
        TransactionRecord {
            hash: H256::from_low_u64_be(0x99),
            chain_id: 1,
            block_number: 17_000_000,
            nonce: 12,
            gas_tip_cap_or_price: U256::from(20_000_000_000u64),
            gas_fee_cap: U256::zero(),
            gas_limit: 21_000,
            from: Address::from_low_u64_be(0xfeed),
            to: DEFAULT_HEDGEHOG_ADDRESS.parse().unwrap(),
            value: U256::from(10u64),
        }
    }

    #[test]
    fn test_prove_then_verify_locally() {
        let artifact = small_artifact("roundtrip");
        let circuit = PredicateCircuit::default();
        let witness = Witness::generate(&circuit, &eligible_record()).unwrap();

        let proof = generate_proof(&artifact, &circuit, &witness).unwrap();
        assert_eq!(proof.circuit_fingerprint, artifact.fingerprint);
        assert_eq!(proof.public_outputs.block_number, 17_000_000);

        verify_locally(&artifact, &proof).unwrap();
    }

    #[test]
    fn test_tampered_outputs_fail_verification() {
        let artifact = small_artifact("tampered");
        let circuit = PredicateCircuit::default();
        let witness = Witness::generate(&circuit, &eligible_record()).unwrap();

        let mut proof = generate_proof(&artifact, &circuit, &witness).unwrap();
        proof.public_outputs.block_number += 1;

        let err = verify_locally(&artifact, &proof).unwrap_err();
        assert!(matches!(err, ProveError::Verification(_)));
    }

    #[test]
    fn test_proof_file_roundtrip() {
        let artifact = small_artifact("file");
        let circuit = PredicateCircuit::default();
        let witness = Witness::generate(&circuit, &eligible_record()).unwrap();
        let proof = generate_proof(&artifact, &circuit, &witness).unwrap();

        let path = env::temp_dir().join("age_prover_prove_file/proof.bin");
        proof.write_to(&path).unwrap();
        let read = Proof::read_from(&path).unwrap();

        assert_eq!(read.bytes, proof.bytes);
        assert_eq!(read.public_outputs, proof.public_outputs);
    }
}
