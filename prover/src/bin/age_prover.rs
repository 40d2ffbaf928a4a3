//! Command-line entry point
//!
//! `age-prover compile` builds and caches the circuit artifacts;
//! `age-prover prove` proves one transaction and submits the proof to the
//! verification gateway.

use std::path::PathBuf;
use std::sync::Arc;

use age_circuit::PredicateCircuit;
use anyhow::{Context, Result};
use chain_client::fetch_transaction_record;
use clap::{Args, Parser, Subcommand};
use ethers_core::types::H256;
use ethers_providers::{Http, Provider};
use prover::{artifact, AppConfig, ArtifactConfig, HttpGateway, ProofPipeline};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "age-prover",
    about = "Prove a transaction predates the cutoff block and submit the proof for on-chain verification",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the predicate circuit into cached proving artifacts
    Compile(CompileArgs),
    /// Prove one transaction and submit the proof to the gateway
    Prove(ProveArgs),
}

#[derive(Args)]
struct ArtifactArgs {
    /// Directory for keys, pinning, and proofs
    #[arg(long, default_value = "circuitOut/age")]
    out: PathBuf,

    /// SRS cache directory
    #[arg(long, default_value = "kzgsrs")]
    srs: PathBuf,

    /// Circuit size parameter (the constraint table has 2^k rows)
    #[arg(long, default_value_t = 17)]
    k: u32,

    /// Lookup bits for range checks
    #[arg(long, default_value_t = 8)]
    lookup_bits: usize,
}

impl ArtifactArgs {
    fn config(&self) -> ArtifactConfig {
        ArtifactConfig::new(self.k, self.lookup_bits, &self.out, &self.srs)
    }
}

#[derive(Args)]
struct CompileArgs {
    #[command(flatten)]
    artifact: ArtifactArgs,
}

#[derive(Args)]
struct ProveArgs {
    #[command(flatten)]
    artifact: ArtifactArgs,

    /// Hash of the transaction to prove
    #[arg(long)]
    tx: String,

    /// JSON-RPC endpoint (overrides environment and config file)
    #[arg(long)]
    rpc: Option<String>,

    /// Verification gateway URL (overrides environment and config file)
    #[arg(long)]
    gateway: Option<String>,

    /// Prove and persist only; print the prepared request without submitting
    #[arg(long)]
    skip_submit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile(args) => run_compile(args),
        Command::Prove(args) => run_prove(args).await,
    }
}

fn run_compile(args: CompileArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let circuit = PredicateCircuit::new(config.circuit);

    let compiled = artifact::compile(&circuit, &args.artifact.config())
        .context("circuit compilation failed")?;

    println!("fingerprint: {}", compiled.fingerprint);
    println!("artifacts:   {}", args.artifact.out.display());
    Ok(())
}

async fn run_prove(args: ProveArgs) -> Result<()> {
    let config = AppConfig::load()?;
    let rpc_url = config.resolve_rpc_url(args.rpc.as_deref());
    let gateway_url = config.resolve_gateway_url(args.gateway.as_deref());

    let hash: H256 = args
        .tx
        .trim_start_matches("0x")
        .parse()
        .context("invalid transaction hash")?;

    let artifact = artifact::load(&args.artifact.config())
        .context("no compiled artifacts found; run `age-prover compile` first")?;
    let circuit = PredicateCircuit::new(config.circuit.clone());

    let provider =
        Provider::<Http>::try_from(rpc_url.as_str()).context("invalid RPC endpoint")?;
    tracing::info!(%hash, rpc = %rpc_url, "fetching transaction");
    let record = fetch_transaction_record(&provider, hash).await?;
    tracing::info!(
        from = ?record.from,
        to = ?record.to,
        block = record.block_number,
        "transaction fetched"
    );

    let mut pipeline = ProofPipeline::new(
        circuit,
        Arc::new(artifact),
        HttpGateway::new(gateway_url),
        config.request_params(),
        config.poll_config(),
    );
    let proof_path = args.artifact.out.join(format!("proof_{hash:x}.bin"));

    if args.skip_submit {
        let witness = pipeline.generate_witness(&record)?;
        let proof = pipeline.generate_proof(&witness)?;
        pipeline.verify_locally(&proof)?;
        proof.write_to(&proof_path).context("persisting proof")?;
        let request = pipeline.prepare_request(&proof)?;

        println!("proof:      {}", proof_path.display());
        println!("request id: {:?}", request.request_id);
        println!("calldata:   0x{}", hex::encode(&request.calldata));
        println!("fee value:  {} wei", request.fee_value);
        return Ok(());
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping finality polling");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = pipeline.run(&record, Some(&proof_path), cancel_rx).await?;

    println!("proof:       {}", proof_path.display());
    println!("request id:  {:?}", outcome.request.request_id);
    println!("sender:      {:?}", outcome.proof.public_outputs.sender);
    println!("block:       {}", outcome.proof.public_outputs.block_number);
    println!("callback tx: {:?}", outcome.callback_tx);
    Ok(())
}
