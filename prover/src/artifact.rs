//! Circuit artifact compilation and storage
//!
//! Compiles the predicate circuit into its durable proving artifacts
//! (structured reference string, proving/verifying keys, circuit pinning)
//! and loads them back for proving runs. Compilation is idempotent: a
//! fingerprint of the circuit definition is stored alongside the keys, and
//! an unchanged circuit reuses the cached artifacts instead of regenerating
//! them.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use age_circuit::{CircuitConfig, PredicateCircuit};
use halo2_base::{
    gates::{
        circuit::{builder::BaseCircuitBuilder, BaseCircuitParams, CircuitBuilderStage},
        flex_gate::MultiPhaseThreadBreakPoints,
    },
    halo2_proofs::{
        halo2curves::bn256::{Bn256, Fr, G1Affine},
        plonk::{keygen_pk, keygen_vk, ProvingKey, VerifyingKey},
        poly::commitment::Params,
        poly::kzg::commitment::ParamsKZG,
        SerdeFormat,
    },
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from artifact compilation and loading
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Key generation or circuit synthesis failed.
    #[error("artifact compilation failed: {0}")]
    Compile(String),

    /// A requested artifact is missing or unreadable at its location.
    #[error("artifact not found at {path:?}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    /// Filesystem failure while persisting artifacts.
    #[error("artifact io at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    fn not_found(path: &Path, reason: impl ToString) -> Self {
        Self::NotFound { path: path.to_path_buf(), reason: reason.to_string() }
    }
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Where and how circuit artifacts are compiled
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    /// Circuit size parameter (the constraint table has 2^k rows)
    pub k: u32,
    /// Lookup bits for range checks
    pub lookup_bits: usize,
    /// Directory holding the keys, pinning, and fingerprint
    pub out_dir: PathBuf,
    /// SRS cache directory, shared across circuits of the same size
    pub srs_dir: PathBuf,
}

impl ArtifactConfig {
    pub fn new(
        k: u32,
        lookup_bits: usize,
        out_dir: impl Into<PathBuf>,
        srs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { k, lookup_bits, out_dir: out_dir.into(), srs_dir: srs_dir.into() }
    }

    fn pinning_path(&self) -> PathBuf {
        self.out_dir.join("pinning.json")
    }

    fn vk_path(&self) -> PathBuf {
        self.out_dir.join("age_vk.bin")
    }

    fn pk_path(&self) -> PathBuf {
        self.out_dir.join("age_pk.bin")
    }

    fn fingerprint_path(&self) -> PathBuf {
        self.out_dir.join("fingerprint.txt")
    }

    fn srs_path(&self) -> PathBuf {
        self.srs_dir.join(format!("kzg_bn254_{}.srs", self.k))
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            k: 17, // 2^17 = 131,072 rows
            lookup_bits: 8,
            out_dir: PathBuf::from("circuitOut/age"),
            srs_dir: PathBuf::from("kzgsrs"),
        }
    }
}

/// Pinned circuit shape
///
/// Fixes the column/row configuration and thread break points chosen during
/// key generation, so prover-stage synthesis reproduces the exact circuit
/// the keys were generated for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitPinning {
    pub params: BaseCircuitParams,
    pub break_points: MultiPhaseThreadBreakPoints,
}

/// Everything a proving run needs, loaded in memory
#[derive(Debug)]
pub struct CompiledArtifact {
    /// Fingerprint of the circuit definition these keys belong to
    pub fingerprint: String,
    /// Pinned circuit shape
    pub pinning: CircuitPinning,
    /// KZG structured reference string
    pub params: ParamsKZG<Bn256>,
    /// Proving key
    pub pk: ProvingKey<G1Affine>,
    /// Verifying key (extracted from the proving key)
    pub vk: VerifyingKey<G1Affine>,
}

/// Fingerprint of a circuit definition
///
/// Hashes the predicate constants together with the compilation parameters;
/// any change to either yields different keys, so both feed the digest.
pub fn circuit_fingerprint(config: &CircuitConfig, artifact: &ArtifactConfig) -> String {
    #[derive(Serialize)]
    struct Defn<'a> {
        circuit: &'a CircuitConfig,
        k: u32,
        lookup_bits: usize,
    }
    let defn = Defn { circuit: config, k: artifact.k, lookup_bits: artifact.lookup_bits };
    let encoded = serde_json::to_vec(&defn).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

/// Compile the circuit into durable artifacts
///
/// Skips recompilation when the stored fingerprint matches the current
/// circuit definition and the cached artifacts load cleanly.
pub fn compile(circuit: &PredicateCircuit, cfg: &ArtifactConfig) -> Result<CompiledArtifact> {
    let fingerprint = circuit_fingerprint(circuit.config(), cfg);

    if stored_fingerprint(cfg).as_deref() == Some(fingerprint.as_str()) {
        tracing::info!(%fingerprint, "circuit unchanged, reusing compiled artifacts");
        match load(cfg) {
            Ok(artifact) => return Ok(artifact),
            Err(e) => {
                tracing::warn!("cached artifacts unusable ({e}), recompiling");
            }
        }
    }

    fs::create_dir_all(&cfg.out_dir).map_err(|e| ArtifactError::io(&cfg.out_dir, e))?;
    let params = load_or_setup_srs(cfg)?;

    tracing::info!(k = cfg.k, lookup_bits = cfg.lookup_bits, "generating proving keys");
    let mut builder = BaseCircuitBuilder::<Fr>::from_stage(CircuitBuilderStage::Keygen)
        .use_k(cfg.k as usize)
        .use_lookup_bits(cfg.lookup_bits);
    builder.set_instance_columns(1);

    let range = builder.range_chip();
    let input = circuit.keygen_input();
    let outputs = circuit
        .synthesize_with_context(builder.main(0), &range, &input)
        .map_err(|e| ArtifactError::Compile(e.to_string()))?;
    builder.assigned_instances[0] = outputs.to_vec();

    let circuit_params = builder.calculate_params(Some(9));

    let vk = keygen_vk(&params, &builder)
        .map_err(|e| ArtifactError::Compile(format!("verifying key generation: {e}")))?;
    let pk = keygen_pk(&params, vk, &builder)
        .map_err(|e| ArtifactError::Compile(format!("proving key generation: {e}")))?;
    let vk = pk.get_vk().clone();

    let pinning = CircuitPinning { params: circuit_params, break_points: builder.break_points() };

    save_pinning(&pinning, &cfg.pinning_path())?;
    save_vk(&vk, &cfg.vk_path())?;
    save_pk(&pk, &cfg.pk_path())?;
    fs::write(cfg.fingerprint_path(), &fingerprint)
        .map_err(|e| ArtifactError::io(&cfg.fingerprint_path(), e))?;

    tracing::info!(out_dir = ?cfg.out_dir, "circuit artifacts compiled");
    Ok(CompiledArtifact { fingerprint, pinning, params, pk, vk })
}

/// Load previously compiled artifacts
pub fn load(cfg: &ArtifactConfig) -> Result<CompiledArtifact> {
    let fingerprint = stored_fingerprint(cfg)
        .ok_or_else(|| ArtifactError::not_found(&cfg.fingerprint_path(), "no fingerprint"))?;

    let pinning = load_pinning(&cfg.pinning_path())?;
    let params = load_srs(&cfg.srs_path())?;
    let vk = load_vk(&cfg.vk_path(), pinning.params.clone())?;
    let pk = load_pk(&cfg.pk_path(), pinning.params.clone())?;

    tracing::info!(out_dir = ?cfg.out_dir, %fingerprint, "loaded circuit artifacts");
    Ok(CompiledArtifact { fingerprint, pinning, params, pk, vk })
}

fn stored_fingerprint(cfg: &ArtifactConfig) -> Option<String> {
    fs::read_to_string(cfg.fingerprint_path())
        .ok()
        .map(|s| s.trim().to_string())
}

/// Load the SRS from the cache, generating and caching it on a miss
///
/// Generation uses an unsafe local setup; a production deployment would
/// drop a ceremony-derived file into the cache directory instead.
fn load_or_setup_srs(cfg: &ArtifactConfig) -> Result<ParamsKZG<Bn256>> {
    let path = cfg.srs_path();
    if path.exists() {
        return load_srs(&path);
    }

    tracing::info!(?path, k = cfg.k, "SRS cache miss, running local setup");
    fs::create_dir_all(&cfg.srs_dir).map_err(|e| ArtifactError::io(&cfg.srs_dir, e))?;
    let params = ParamsKZG::<Bn256>::setup(cfg.k, OsRng);

    let file = File::create(&path).map_err(|e| ArtifactError::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    params.write(&mut writer).map_err(|e| ArtifactError::io(&path, e))?;
    writer.flush().map_err(|e| ArtifactError::io(&path, e))?;

    Ok(params)
}

fn load_srs(path: &Path) -> Result<ParamsKZG<Bn256>> {
    let file = File::open(path).map_err(|e| ArtifactError::not_found(path, e))?;
    let mut reader = BufReader::new(file);
    ParamsKZG::<Bn256>::read(&mut reader).map_err(|e| ArtifactError::not_found(path, e))
}

fn save_pinning(pinning: &CircuitPinning, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ArtifactError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), pinning)
        .map_err(|e| ArtifactError::io(path, e.into()))
}

fn load_pinning(path: &Path) -> Result<CircuitPinning> {
    let file = File::open(path).map_err(|e| ArtifactError::not_found(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ArtifactError::not_found(path, e))
}

fn save_vk(vk: &VerifyingKey<G1Affine>, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    vk.write(&mut writer, SerdeFormat::RawBytesUnchecked)
        .map_err(|e| ArtifactError::io(path, e))?;
    writer.flush().map_err(|e| ArtifactError::io(path, e))
}

fn load_vk(path: &Path, params: BaseCircuitParams) -> Result<VerifyingKey<G1Affine>> {
    let file = File::open(path).map_err(|e| ArtifactError::not_found(path, e))?;
    let mut reader = BufReader::new(file);
    VerifyingKey::read::<_, BaseCircuitBuilder<Fr>>(
        &mut reader,
        SerdeFormat::RawBytesUnchecked,
        params,
    )
    .map_err(|e| ArtifactError::not_found(path, e))
}

fn save_pk(pk: &ProvingKey<G1Affine>, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    pk.write(&mut writer, SerdeFormat::RawBytesUnchecked)
        .map_err(|e| ArtifactError::io(path, e))?;
    writer.flush().map_err(|e| ArtifactError::io(path, e))
}

fn load_pk(path: &Path, params: BaseCircuitParams) -> Result<ProvingKey<G1Affine>> {
    let file = File::open(path).map_err(|e| ArtifactError::not_found(path, e))?;
    let mut reader = BufReader::new(file);
    ProvingKey::read::<_, BaseCircuitBuilder<Fr>>(
        &mut reader,
        SerdeFormat::RawBytesUnchecked,
        params,
    )
    .map_err(|e| ArtifactError::not_found(path, e))
}

/// Serialize a verifying key to bytes, for hashing and request preparation
pub fn vk_bytes(vk: &VerifyingKey<G1Affine>) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    vk.write(&mut bytes, SerdeFormat::RawBytesUnchecked)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn test_cfg(name: &str) -> ArtifactConfig {
        let root = env::temp_dir().join(format!("age_prover_artifact_{name}"));
        ArtifactConfig::new(11, 10, root.join("out"), root.join("srs"))
    }

    #[test]
    fn test_artifact_paths() {
        let cfg = ArtifactConfig::new(10, 8, "/tmp/age/out", "/tmp/age/srs");
        assert_eq!(cfg.pinning_path(), PathBuf::from("/tmp/age/out/pinning.json"));
        assert_eq!(cfg.vk_path(), PathBuf::from("/tmp/age/out/age_vk.bin"));
        assert_eq!(cfg.pk_path(), PathBuf::from("/tmp/age/out/age_pk.bin"));
        assert_eq!(cfg.srs_path(), PathBuf::from("/tmp/age/srs/kzg_bn254_10.srs"));
    }

    #[test]
    fn test_fingerprint_tracks_circuit_definition() {
        let cfg = ArtifactConfig::default();
        let base = CircuitConfig::default();
        let a = circuit_fingerprint(&base, &cfg);
        assert_eq!(a, circuit_fingerprint(&base, &cfg));

        let mut changed = base.clone();
        changed.cutoff_block += 1;
        assert_ne!(a, circuit_fingerprint(&changed, &cfg));

        let mut bigger = cfg.clone();
        bigger.k += 1;
        assert_ne!(a, circuit_fingerprint(&base, &bigger));
    }

    #[test]
    fn test_load_without_compile_is_not_found() {
        let cfg = test_cfg("missing");
        let err = load(&cfg).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }));
    }

    #[test]
    fn test_compile_then_load_roundtrip() {
        let cfg = test_cfg("roundtrip");
        let _ = fs::remove_dir_all(cfg.out_dir.parent().unwrap());
        let circuit = PredicateCircuit::default();

        let compiled = compile(&circuit, &cfg).unwrap();
        let loaded = load(&cfg).unwrap();

        assert_eq!(compiled.fingerprint, loaded.fingerprint);
        assert_eq!(compiled.pinning.params.k, 11);
        assert_eq!(compiled.pinning.break_points, loaded.pinning.break_points);
        assert_eq!(
            vk_bytes(&compiled.vk).unwrap(),
            vk_bytes(&loaded.vk).unwrap()
        );
    }

    #[test]
    fn test_recompile_reuses_cached_artifacts() {
        let cfg = test_cfg("idempotent");
        let _ = fs::remove_dir_all(cfg.out_dir.parent().unwrap());
        let circuit = PredicateCircuit::default();

        let first = compile(&circuit, &cfg).unwrap();
        let vk_before = fs::metadata(cfg.vk_path()).unwrap().modified().unwrap();
        let second = compile(&circuit, &cfg).unwrap();
        let vk_after = fs::metadata(cfg.vk_path()).unwrap().modified().unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(vk_before, vk_after);
    }
}
