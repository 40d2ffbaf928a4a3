//! Gateway submission request preparation
//!
//! Packages a proof's public claim into the calldata the verification
//! gateway expects, and derives a deterministic request id so resubmitting
//! the same claim is idempotent on the gateway side.

use age_circuit::PublicOutputs;
use ethers_core::types::{Address, H256, U256};
use halo2_base::halo2_proofs::{halo2curves::bn256::G1Affine, plonk::VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::artifact;

/// Proof format version understood by the gateway
pub const PROOF_VERSION: u32 = 1;

/// Target chains the gateway dispatches callbacks to
const SUPPORTED_TARGET_CHAINS: &[u64] = &[1, 11_155_111];

/// Domain separation tag for request id derivation
const REQUEST_DOMAIN: &[u8] = b"age-prover:request:v1";

/// Errors from request preparation
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("target chain {0} is not supported by the gateway")]
    UnsupportedChain(u64),

    #[error("callback contract address is zero")]
    MissingCallback,

    #[error("verifying key could not be serialized: {0}")]
    MalformedKey(String),
}

/// Result type for request preparation
pub type Result<T> = std::result::Result<T, RequestError>;

/// Everything needed to address a request to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Proof format version
    pub proof_version: u32,
    /// Chain the callback is dispatched on
    pub target_chain_id: u64,
    /// Address refunded any unspent fee
    pub refund_address: Address,
    /// Contract receiving the verified outputs
    pub callback_contract: Address,
    /// Flat submission fee, in wei
    pub fee_value: U256,
}

/// A prepared submission, ready to send to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Deterministic id for this claim; resubmissions reuse it
    pub request_id: H256,
    /// Request envelope: version, key hash, outputs, routing
    pub calldata: Vec<u8>,
    /// Fee attached to the submission, in wei
    pub fee_value: U256,
}

/// Prepare a gateway submission for a proof's public outputs
pub fn prepare_request(
    vk: &VerifyingKey<G1Affine>,
    outputs: &PublicOutputs,
    params: &RequestParams,
) -> Result<SubmissionRequest> {
    let vk_bytes =
        artifact::vk_bytes(vk).map_err(|e| RequestError::MalformedKey(e.to_string()))?;
    let mut vk_hash = [0u8; 32];
    vk_hash.copy_from_slice(&Sha256::digest(&vk_bytes));
    derive_request(vk_hash, outputs, params)
}

/// Derive the request from an already-hashed verifying key
///
/// The request id commits to everything that distinguishes one claim from
/// another: the circuit (via the key hash), the public outputs, and the
/// routing parameters. Fee value is deliberately excluded so a fee bump
/// does not mint a new request.
pub fn derive_request(
    vk_hash: [u8; 32],
    outputs: &PublicOutputs,
    params: &RequestParams,
) -> Result<SubmissionRequest> {
    if !SUPPORTED_TARGET_CHAINS.contains(&params.target_chain_id) {
        return Err(RequestError::UnsupportedChain(params.target_chain_id));
    }
    if params.callback_contract == Address::zero() {
        return Err(RequestError::MissingCallback);
    }

    let mut calldata = Vec::with_capacity(32 + 20 + 8 + 4 + 8 + 20 + 20);
    calldata.extend_from_slice(&params.proof_version.to_be_bytes());
    calldata.extend_from_slice(&vk_hash);
    calldata.extend_from_slice(outputs.sender.as_bytes());
    calldata.extend_from_slice(&outputs.block_number.to_be_bytes());
    calldata.extend_from_slice(&params.target_chain_id.to_be_bytes());
    calldata.extend_from_slice(params.refund_address.as_bytes());
    calldata.extend_from_slice(params.callback_contract.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(REQUEST_DOMAIN);
    hasher.update(&calldata);
    let request_id = H256::from_slice(&hasher.finalize());

    tracing::debug!(
        %request_id,
        chain = params.target_chain_id,
        "submission request prepared"
    );
    Ok(SubmissionRequest { request_id, calldata, fee_value: params.fee_value })
}
