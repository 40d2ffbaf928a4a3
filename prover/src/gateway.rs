//! Verification gateway client and finality polling
//!
//! Submits prepared requests to the proof verification gateway over HTTP
//! and polls until the gateway reports the final proof landed on the target
//! chain. Polling backs off exponentially up to a cap, honors an overall
//! deadline, and reacts to cancellation within one polling interval.

use std::time::Duration;

use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::prove::Proof;
use crate::request::SubmissionRequest;

/// Errors from gateway communication
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("gateway transport error")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway rejected the request (http {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The gateway answered with something we cannot interpret.
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// Where the gateway says a request currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Still queued, proving, or awaiting on-chain settlement
    Pending,
    /// The final proof transaction landed on the target chain
    FinalProofSubmitted { tx_hash: H256 },
}

/// Client interface to the verification gateway
///
/// A trait so the polling loop and the pipeline can run against a scripted
/// gateway in tests.
pub trait ProofGateway {
    fn submit_proof(
        &self,
        request: &SubmissionRequest,
        proof: &Proof,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>>;

    fn query_status(
        &self,
        request_id: H256,
    ) -> impl std::future::Future<Output = Result<QueryStatus, GatewayError>>;
}

/// HTTP gateway client
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    request_id: H256,
    calldata: String,
    proof: String,
    fee_value: &'a ethers_core::types::U256,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
    tx_hash: Option<H256>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl ProofGateway for HttpGateway {
    async fn submit_proof(
        &self,
        request: &SubmissionRequest,
        proof: &Proof,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/requests", self.base_url);
        let body = SubmitBody {
            request_id: request.request_id,
            calldata: format!("0x{}", hex::encode(&request.calldata)),
            proof: format!("0x{}", hex::encode(&proof.bytes)),
            fee_value: &request.fee_value,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, message });
        }

        tracing::info!(request_id = %request.request_id, "proof submitted to gateway");
        Ok(())
    }

    async fn query_status(&self, request_id: H256) -> Result<QueryStatus, GatewayError> {
        let url = format!("{}/requests/0x{}", self.base_url, hex::encode(request_id));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, message });
        }

        let body: StatusBody = response.json().await?;
        match body.status.as_str() {
            "final_proof_submitted" => {
                let tx_hash = body.tx_hash.ok_or_else(|| {
                    GatewayError::Malformed("final status without tx hash".to_string())
                })?;
                Ok(QueryStatus::FinalProofSubmitted { tx_hash })
            }
            "pending" | "proving" | "submitting" => Ok(QueryStatus::Pending),
            other => Err(GatewayError::Malformed(format!("unknown status {other:?}"))),
        }
    }
}

/// Finality polling schedule
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// First interval between status queries
    pub initial_interval: Duration,
    /// Backoff cap; intervals double until they reach this
    pub max_interval: Duration,
    /// Overall deadline for the whole wait
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Why the finality wait ended without a callback transaction
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("finality polling cancelled")]
    Cancelled,

    #[error("finality polling timed out after {0:?}")]
    TimedOut(Duration),
}

/// Poll the gateway until the final proof lands on the target chain
///
/// Transient query failures are logged and retried; they only become fatal
/// through the overall deadline. Flipping the cancel channel to `true` (or
/// dropping its sender) ends the wait within one polling interval.
pub async fn wait_final_proof_submitted<G: ProofGateway>(
    gateway: &G,
    request_id: H256,
    poll: &PollConfig,
    mut cancel: watch::Receiver<bool>,
) -> Result<H256, WaitError> {
    let deadline = Instant::now() + poll.timeout;
    let mut interval = poll.initial_interval;

    if *cancel.borrow() {
        return Err(WaitError::Cancelled);
    }

    loop {
        match gateway.query_status(request_id).await {
            Ok(QueryStatus::FinalProofSubmitted { tx_hash }) => {
                tracing::info!(%request_id, %tx_hash, "final proof submitted on target chain");
                return Ok(tx_hash);
            }
            Ok(QueryStatus::Pending) => {
                tracing::debug!(%request_id, "request still pending");
            }
            Err(e) => {
                tracing::warn!(%request_id, "status query failed, will retry: {e}");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut(poll.timeout));
        }
        let sleep_for = interval.min(deadline - now);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return Err(WaitError::Cancelled);
                }
            }
        }

        interval = (interval * 2).min(poll.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant as StdInstant;

    struct ScriptedGateway {
        pending_polls: Mutex<u32>,
        tx_hash: H256,
    }

    impl ScriptedGateway {
        fn new(pending_polls: u32) -> Self {
            Self {
                pending_polls: Mutex::new(pending_polls),
                tx_hash: H256::from_low_u64_be(0xbeef),
            }
        }
    }

    impl ProofGateway for ScriptedGateway {
        async fn submit_proof(
            &self,
            _request: &SubmissionRequest,
            _proof: &Proof,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn query_status(&self, _request_id: H256) -> Result<QueryStatus, GatewayError> {
            let mut remaining = self.pending_polls.lock().unwrap();
            if *remaining == 0 {
                Ok(QueryStatus::FinalProofSubmitted { tx_hash: self.tx_hash })
            } else {
                *remaining -= 1;
                Ok(QueryStatus::Pending)
            }
        }
    }

    fn fast_poll(timeout: Duration) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(10),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_wait_resolves_after_pending_polls() {
        let gateway = ScriptedGateway::new(3);
        let (_tx, rx) = watch::channel(false);

        let tx_hash = wait_final_proof_submitted(
            &gateway,
            H256::zero(),
            &fast_poll(Duration::from_secs(5)),
            rx,
        )
        .await
        .unwrap();

        assert_eq!(tx_hash, H256::from_low_u64_be(0xbeef));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let gateway = ScriptedGateway::new(u32::MAX);
        let (_tx, rx) = watch::channel(false);

        let err = wait_final_proof_submitted(
            &gateway,
            H256::zero(),
            &fast_poll(Duration::from_millis(40)),
            rx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WaitError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_cancel_honored_within_one_interval() {
        let gateway = ScriptedGateway::new(u32::MAX);
        let (tx, rx) = watch::channel(false);
        let poll = PollConfig {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let started = StdInstant::now();
        let err = wait_final_proof_submitted(&gateway, H256::zero(), &poll, rx)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Cancelled));
        assert!(started.elapsed() < poll.initial_interval);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let gateway = ScriptedGateway::new(0);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = wait_final_proof_submitted(
            &gateway,
            H256::zero(),
            &fast_poll(Duration::from_secs(5)),
            rx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WaitError::Cancelled));
    }
}
