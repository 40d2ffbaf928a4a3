//! Application configuration
//!
//! Settings resolve in order: command-line flag, environment variable, then
//! `~/.age-prover/config.toml`, falling back to built-in defaults. The file
//! may set any subset of fields.

use std::path::PathBuf;
use std::time::Duration;

use age_circuit::CircuitConfig;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::gateway::PollConfig;
use crate::request::{RequestParams, PROOF_VERSION};

/// Default JSON-RPC endpoint for fetching mainnet transactions
pub const DEFAULT_RPC_URL: &str = "https://gateway.tenderly.co/public/mainnet";

/// Default verification gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.brevis.network";

/// Default callback contract on the target chain
pub const DEFAULT_CALLBACK_CONTRACT: &str = "0xef1B4B164Fd3b7933bfaDb042373560e715Ec5D6";

/// Default fee refund address
pub const DEFAULT_REFUND_ADDRESS: &str = "0x164Ef8f77e1C88Fb2C724D3755488bE4a3ba4342";

/// Default target chain for the callback (Sepolia)
pub const DEFAULT_TARGET_CHAIN_ID: u64 = 11_155_111;

/// Default flat submission fee, in wei
pub const DEFAULT_FEE_VALUE_WEI: u64 = 30_000_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON-RPC endpoint the transaction is fetched from
    pub rpc_url: String,
    /// Verification gateway base URL
    pub gateway_url: String,
    /// Predicate constants baked into the circuit
    pub circuit: CircuitConfig,
    /// Proof format version sent to the gateway
    pub proof_version: u32,
    /// Chain the callback is dispatched on
    pub target_chain_id: u64,
    /// Address refunded any unspent fee
    pub refund_address: Address,
    /// Contract receiving the verified outputs
    pub callback_contract: Address,
    /// Flat submission fee, in wei
    pub fee_value_wei: u64,
    /// First finality polling interval, in milliseconds
    pub poll_initial_interval_ms: u64,
    /// Polling backoff cap, in milliseconds
    pub poll_max_interval_ms: u64,
    /// Overall finality deadline, in seconds
    pub poll_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            circuit: CircuitConfig::default(),
            proof_version: PROOF_VERSION,
            target_chain_id: DEFAULT_TARGET_CHAIN_ID,
            refund_address: DEFAULT_REFUND_ADDRESS
                .parse()
                .expect("default refund address is valid hex"),
            callback_contract: DEFAULT_CALLBACK_CONTRACT
                .parse()
                .expect("default callback contract is valid hex"),
            fee_value_wei: DEFAULT_FEE_VALUE_WEI,
            poll_initial_interval_ms: poll.initial_interval.as_millis() as u64,
            poll_max_interval_ms: poll.max_interval.as_millis() as u64,
            poll_timeout_secs: poll.timeout.as_secs(),
        }
    }
}

impl AppConfig {
    /// Load `~/.age-prover/config.toml`, falling back to defaults
    ///
    /// A missing file is not an error; an unparseable one is.
    pub fn load() -> anyhow::Result<Self> {
        match config_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)?;
                let config: Self = toml::from_str(&raw)?;
                tracing::debug!(?path, "loaded configuration file");
                Ok(config)
            }
            _ => Ok(Self::default()),
        }
    }

    /// RPC endpoint: flag, then `AGE_PROVER_RPC_URL`, then `RPC_URL`,
    /// then the configured value
    pub fn resolve_rpc_url(&self, flag: Option<&str>) -> String {
        resolve(flag, &["AGE_PROVER_RPC_URL", "RPC_URL"], &self.rpc_url)
    }

    /// Gateway endpoint: flag, then `AGE_PROVER_GATEWAY_URL`, then the
    /// configured value
    pub fn resolve_gateway_url(&self, flag: Option<&str>) -> String {
        resolve(flag, &["AGE_PROVER_GATEWAY_URL"], &self.gateway_url)
    }

    /// Routing parameters for gateway submission
    pub fn request_params(&self) -> RequestParams {
        RequestParams {
            proof_version: self.proof_version,
            target_chain_id: self.target_chain_id,
            refund_address: self.refund_address,
            callback_contract: self.callback_contract,
            fee_value: U256::from(self.fee_value_wei),
        }
    }

    /// Finality polling schedule
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(self.poll_initial_interval_ms),
            max_interval: Duration::from_millis(self.poll_max_interval_ms),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

fn resolve(flag: Option<&str>, env_vars: &[&str], fallback: &str) -> String {
    if let Some(value) = flag.filter(|v| !v.is_empty()) {
        return value.to_string();
    }
    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    fallback.to_string()
}

fn config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".age-prover").join("config.toml"))
}
