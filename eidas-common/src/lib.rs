// eidas/eidas-common/src/lib.rs
// Numan Thabit 2025

pub mod cert;
pub mod signature;
pub mod solidity;
pub mod status;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, ensure, Context, Result};
use ark_bn254::{Bn254, Fr};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use eidas_circuit::{
    CertificateProfile, BINDING_CHALLENGE_LEN, MINIMAL_CHALLENGE_LEN,
    profile::SUBJECT_LEN,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use solidity::{SolidityCall, SolidityProof};
pub use status::StatusEvent;

pub const CIRCUIT_VERSION: u32 = 1;
pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const PROVING_KEY_FILE: &str = "pk.bin";
pub const VERIFYING_KEY_FILE: &str = "vk.bin";
pub const CIRCUIT_FILE: &str = "circuit.json";
pub const VERIFIER_CONTRACT_FILE: &str = "Verifier.sol";

/// Errors raised while converting between host encodings of signatures,
/// keys and certificates. Every variant is fatal for the session.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed ASN.1 signature")]
    Asn1Signature,
    #[error("fixed-width signature must be {expected} bytes, got {actual}")]
    SignatureLength { expected: usize, actual: usize },
    #[error("unexpected tag/length bytes at signature offset {0}")]
    SignaturePrefix(usize),
    #[error("signature scalars do not fit the {0:?} layout")]
    EncodingMismatch(eidas_circuit::SignatureEncoding),
    #[error("message of {0} bytes is wider than a P-384 scalar")]
    MessageTooLong(usize),
    #[error("invalid P-384 public key")]
    PublicKey,
    #[error("signature does not verify")]
    Verification,
    #[error("certificate encoding: {0}")]
    Der(#[from] x509_cert::der::Error),
    #[error("certificate does not re-encode byte-exact")]
    RoundTrip,
    #[error("unsupported certificate signature algorithm {0}")]
    UnsupportedAlgorithm(String),
    #[error("{0} not found in certificate")]
    NotFound(&'static str),
    #[error("{0} occurs more than once in certificate")]
    Ambiguous(&'static str),
    #[error(transparent)]
    Circuit(#[from] eidas_circuit::CircuitError),
}

/// Which circuit shape a set of artifacts was generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    Minimal,
    Binding,
}

impl CircuitKind {
    pub fn public_input_count(&self) -> usize {
        match self {
            Self::Minimal => MINIMAL_CHALLENGE_LEN,
            Self::Binding => BINDING_CHALLENGE_LEN + SUBJECT_LEN,
        }
    }
}

/// Contents of `circuit.json`: enough to rebuild the exact circuit shape the
/// keys were generated for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    pub kind: CircuitKind,
    pub circuit_version: u32,
    pub public_input_count: usize,
    /// Only present for the binding circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<CertificateProfile>,
}

impl CircuitDescriptor {
    pub fn minimal() -> Self {
        Self {
            kind: CircuitKind::Minimal,
            circuit_version: CIRCUIT_VERSION,
            public_input_count: CircuitKind::Minimal.public_input_count(),
            profile: None,
        }
    }

    pub fn binding(profile: CertificateProfile) -> Self {
        Self {
            kind: CircuitKind::Binding,
            circuit_version: CIRCUIT_VERSION,
            public_input_count: CircuitKind::Binding.public_input_count(),
            profile: Some(profile),
        }
    }

    /// The certificate profile a binding descriptor carries.
    pub fn binding_profile(&self) -> Result<&CertificateProfile> {
        ensure!(
            self.kind == CircuitKind::Binding,
            "artifacts were generated for the {:?} circuit",
            self.kind
        );
        self.profile
            .as_ref()
            .ok_or_else(|| anyhow!("binding circuit descriptor carries no certificate profile"))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofBundle {
    pub circuit_version: u32,
    pub kind: CircuitKind,
    /// Compressed arkworks serialization of the Groth16 proof.
    #[serde(with = "eidas_circuit::witness::hex_vec")]
    pub proof: Vec<u8>,
    /// Public inputs as decimal field elements, in instance order.
    pub public_inputs: Vec<String>,
}

impl ProofBundle {
    pub fn new(kind: CircuitKind, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> Result<Self> {
        Ok(Self {
            circuit_version: CIRCUIT_VERSION,
            kind,
            proof: serialize_proof(proof)?,
            public_inputs: public_inputs.iter().map(fr_to_decimal).collect(),
        })
    }

    pub fn proof(&self) -> Result<Proof<Bn254>> {
        deserialize_proof(&self.proof)
    }

    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        self.public_inputs
            .iter()
            .map(|value| fr_from_decimal(value))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub blake3: String,
    pub size: u64,
}

impl ArtifactFile {
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            blake3: hash_bytes_hex(bytes),
            size: bytes.len() as u64,
        }
    }

    fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub manifest_version: u32,
    pub circuit_version: u32,
    pub kind: CircuitKind,
    pub created_at_unix: u64,
    pub circuit: ArtifactFile,
    pub pk: ArtifactFile,
    pub vk: ArtifactFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_contract: Option<ArtifactFile>,
}

#[derive(Clone, Debug)]
pub struct VerifierArtifacts {
    pub manifest: ArtifactManifest,
    pub descriptor: CircuitDescriptor,
    pub vk_bytes: Vec<u8>,
    pub vk: VerifyingKey<Bn254>,
}

#[derive(Clone, Debug)]
pub struct ProverArtifacts {
    pub manifest: ArtifactManifest,
    pub descriptor: CircuitDescriptor,
    pub vk: VerifyingKey<Bn254>,
    pub pk: ProvingKey<Bn254>,
}

pub fn serialize_proving_key(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(pk.compressed_size());
    pk.serialize_compressed(&mut buf)
        .context("failed to serialize proving key")?;
    Ok(buf)
}

/// Proving keys are only read back after their blake3 hash matched the
/// manifest, so the expensive subgroup checks are skipped.
pub fn deserialize_proving_key(bytes: &[u8]) -> Result<ProvingKey<Bn254>> {
    ProvingKey::deserialize_compressed_unchecked(bytes)
        .context("failed to deserialize proving key")
}

pub fn serialize_verifying_key(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(vk.compressed_size());
    vk.serialize_compressed(&mut buf)
        .context("failed to serialize verifying key")?;
    Ok(buf)
}

pub fn deserialize_verifying_key(bytes: &[u8]) -> Result<VerifyingKey<Bn254>> {
    VerifyingKey::deserialize_compressed(bytes).context("failed to deserialize verifying key")
}

pub fn serialize_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(proof.compressed_size());
    proof
        .serialize_compressed(&mut buf)
        .context("failed to serialize proof")?;
    Ok(buf)
}

pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>> {
    Proof::deserialize_compressed(bytes).context("failed to deserialize proof")
}

pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn fr_to_decimal(value: &Fr) -> String {
    value.into_bigint().to_string()
}

/// Parse a decimal field element, rejecting values at or above the modulus
/// instead of reducing them.
pub fn fr_from_decimal(text: &str) -> Result<Fr> {
    let bigint: <Fr as PrimeField>::BigInt = text
        .parse()
        .map_err(|_| anyhow!("invalid decimal field element {text:?}"))?;
    Fr::from_bigint(bigint).ok_or_else(|| anyhow!("{text} is not below the BN254 scalar modulus"))
}

/// Big-endian 32-byte encoding of a BN254 scalar.
pub fn fr_to_be_bytes(value: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&value.into_bigint().to_bytes_be());
    out
}

/// Write `bytes` to `path` through a temporary sibling file and a rename, so a
/// failed write never leaves a truncated artifact behind.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("artifact path {} has no file name", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to move artifact into {}", path.display()))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Write one artifact into `dir` and describe it for the manifest.
pub fn write_artifact(dir: impl AsRef<Path>, name: &str, bytes: &[u8]) -> Result<ArtifactFile> {
    write_atomic(dir.as_ref().join(name), bytes)?;
    Ok(ArtifactFile::from_bytes(name, bytes))
}

pub fn write_manifest(path: impl AsRef<Path>, manifest: &ArtifactManifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest).context("failed to serialize manifest")?;
    write_atomic(path, &json).context("failed to write manifest")
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<ArtifactManifest> {
    let bytes = fs::read(path.as_ref()).context("failed to read manifest file")?;
    serde_json::from_slice(&bytes).context("failed to parse manifest json")
}

pub fn load_verifier_artifacts(path: impl AsRef<Path>) -> Result<VerifierArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest)?;
    let base_dir = manifest_dir(manifest_path);

    let descriptor = read_descriptor(&base_dir, &manifest)?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;
    let vk = deserialize_verifying_key(&vk_bytes)?;
    ensure_vk_arity(&vk, &descriptor)?;

    Ok(VerifierArtifacts {
        manifest,
        descriptor,
        vk_bytes,
        vk,
    })
}

pub fn load_prover_artifacts(path: impl AsRef<Path>) -> Result<ProverArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest)?;
    let base_dir = manifest_dir(manifest_path);

    let descriptor = read_descriptor(&base_dir, &manifest)?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;
    let pk_bytes = read_artifact_file(&base_dir, &manifest.pk, "proving key")?;
    let vk = deserialize_verifying_key(&vk_bytes)?;
    let pk = deserialize_proving_key(&pk_bytes)?;
    ensure_vk_arity(&vk, &descriptor)?;
    ensure!(
        pk.vk == vk,
        "proving key does not embed the verifying key listed in the manifest"
    );

    tracing::debug!(
        kind = ?descriptor.kind,
        pk_bytes = pk_bytes.len(),
        "loaded prover artifacts"
    );
    Ok(ProverArtifacts {
        manifest,
        descriptor,
        vk,
        pk,
    })
}

fn read_descriptor(base_dir: &Path, manifest: &ArtifactManifest) -> Result<CircuitDescriptor> {
    let bytes = read_artifact_file(base_dir, &manifest.circuit, "circuit descriptor")?;
    let descriptor: CircuitDescriptor =
        serde_json::from_slice(&bytes).context("failed to parse circuit descriptor")?;
    ensure!(
        descriptor.kind == manifest.kind,
        "circuit descriptor kind {:?} disagrees with manifest kind {:?}",
        descriptor.kind,
        manifest.kind
    );
    ensure!(
        descriptor.circuit_version == manifest.circuit_version,
        "circuit descriptor version {} disagrees with manifest version {}",
        descriptor.circuit_version,
        manifest.circuit_version
    );
    ensure!(
        descriptor.public_input_count == descriptor.kind.public_input_count(),
        "circuit descriptor declares {} public inputs, {:?} circuit has {}",
        descriptor.public_input_count,
        descriptor.kind,
        descriptor.kind.public_input_count()
    );
    if let Some(profile) = &descriptor.profile {
        profile
            .validate()
            .context("circuit descriptor carries an invalid certificate profile")?;
    }
    Ok(descriptor)
}

fn ensure_vk_arity(vk: &VerifyingKey<Bn254>, descriptor: &CircuitDescriptor) -> Result<()> {
    ensure!(
        vk.gamma_abc_g1.len() == descriptor.public_input_count + 1,
        "verifying key expects {} public inputs, descriptor declares {}",
        vk.gamma_abc_g1.len().saturating_sub(1),
        descriptor.public_input_count
    );
    Ok(())
}

fn read_artifact_file(base_dir: &Path, entry: &ArtifactFile, label: &str) -> Result<Vec<u8>> {
    let path = entry.resolve_path(base_dir);
    let bytes = fs::read(&path)
        .with_context(|| format!("failed to read {} at {}", label, path.display()))?;
    ensure!(
        bytes.len() as u64 == entry.size,
        "{} size mismatch, manifest recorded {} bytes but found {}",
        label,
        entry.size,
        bytes.len(),
    );
    ensure_hash(&bytes, &entry.blake3, label)?;
    Ok(bytes)
}

fn ensure_hash(bytes: &[u8], expected_hex: &str, label: &str) -> Result<()> {
    let actual = hash_bytes_hex(bytes);
    ensure!(
        actual == expected_hex,
        "{} hash mismatch, expected {} but computed {}",
        label,
        expected_hex,
        actual
    );
    Ok(())
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn ensure_manifest_compat(manifest: &ArtifactManifest) -> Result<()> {
    ensure!(
        manifest.manifest_version == MANIFEST_VERSION,
        "unsupported manifest version {}, expected {}",
        manifest.manifest_version,
        MANIFEST_VERSION
    );
    ensure!(
        manifest.circuit_version == CIRCUIT_VERSION,
        "circuit version mismatch: manifest {} vs crate {}",
        manifest.circuit_version,
        CIRCUIT_VERSION
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_field_elements_reject_values_above_modulus() {
        let value = Fr::from(2024u64);
        assert_eq!(fr_from_decimal(&fr_to_decimal(&value)).unwrap(), value);

        let modulus = Fr::MODULUS.to_string();
        assert!(fr_from_decimal(&modulus).is_err());
        assert!(fr_from_decimal("not a number").is_err());
    }

    #[test]
    fn fr_bytes_are_big_endian() {
        let bytes = fr_to_be_bytes(&Fr::from(0x0102u64));
        assert_eq!(&bytes[30..], &[0x01, 0x02]);
        assert!(bytes[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write_artifact(dir.path(), "vk.bin", b"key material").unwrap();
        assert_eq!(entry.size, 12);
        assert_eq!(fs::read(dir.path().join("vk.bin")).unwrap(), b"key material");
        assert!(!dir.path().join("vk.bin.tmp").exists());
    }

    #[test]
    fn atomic_write_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("pk.bin");
        assert!(write_atomic(&target, b"x").is_err());
        assert!(!target.exists());
    }

    #[test]
    fn descriptor_arity_follows_kind() {
        assert_eq!(CircuitDescriptor::minimal().public_input_count, 32);
        let binding = CircuitDescriptor::binding(CertificateProfile::eidas());
        assert_eq!(binding.public_input_count, 27);
        assert!(binding.binding_profile().is_ok());
        assert!(CircuitDescriptor::minimal().binding_profile().is_err());
    }

    #[test]
    fn tampered_artifact_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = CircuitDescriptor::minimal();
        let circuit = write_artifact(
            dir.path(),
            CIRCUIT_FILE,
            &serde_json::to_vec(&descriptor).unwrap(),
        )
        .unwrap();
        let vk = write_artifact(dir.path(), VERIFYING_KEY_FILE, b"vk").unwrap();
        let manifest = ArtifactManifest {
            manifest_version: MANIFEST_VERSION,
            circuit_version: CIRCUIT_VERSION,
            kind: CircuitKind::Minimal,
            created_at_unix: 0,
            circuit,
            pk: ArtifactFile::from_bytes(PROVING_KEY_FILE, b"pk"),
            vk,
            verifier_contract: None,
        };
        let manifest_path = dir.path().join(MANIFEST_FILE);
        write_manifest(&manifest_path, &manifest).unwrap();
        fs::write(dir.path().join(VERIFYING_KEY_FILE), b"VK").unwrap();

        let err = load_verifier_artifacts(&manifest_path).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"), "{err}");
    }

    #[test]
    fn manifest_version_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ArtifactManifest {
            manifest_version: MANIFEST_VERSION + 1,
            circuit_version: CIRCUIT_VERSION,
            kind: CircuitKind::Minimal,
            created_at_unix: 0,
            circuit: ArtifactFile::from_bytes(CIRCUIT_FILE, b""),
            pk: ArtifactFile::from_bytes(PROVING_KEY_FILE, b""),
            vk: ArtifactFile::from_bytes(VERIFYING_KEY_FILE, b""),
            verifier_contract: None,
        };
        let manifest_path = dir.path().join(MANIFEST_FILE);
        write_manifest(&manifest_path, &manifest).unwrap();
        let err = load_prover_artifacts(&manifest_path).unwrap_err();
        assert!(err.to_string().contains("unsupported manifest version"));
    }
}
