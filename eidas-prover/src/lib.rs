// eidas/eidas-prover/src/lib.rs
// Numan Thabit 2025

use std::{path::Path, time::Instant};

use ark_bn254::{Bn254, Fr};
use ark_ff::UniformRand;
use ark_groth16::{Groth16, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisError,
};
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use eidas_circuit::{
    BindingCircuitInput, CertificateBindingCircuit, CertificateProfile, CircuitError,
    MinimalCircuit, MinimalCircuitInput,
};
use eidas_common::{
    serialize_proving_key, serialize_verifying_key, write_artifact, write_manifest,
    ArtifactManifest, CircuitDescriptor, CircuitKind, ProofBundle, ProverArtifacts, SolidityCall,
    CIRCUIT_FILE, MANIFEST_FILE, MANIFEST_VERSION, PROVING_KEY_FILE, VERIFIER_CONTRACT_FILE,
    VERIFYING_KEY_FILE,
};
use eidas_verifier::export_solidity_verifier;

/// Failures of the setup/prove/verify handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Shape or witness problem caught before proving.
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    /// The witness does not satisfy the circuit. Deliberately carries no
    /// detail about which constraint failed.
    #[error("proof could not be constructed")]
    Unsatisfiable,
    #[error("proving system error: {0}")]
    Proving(SynthesisError),
    /// The freshly generated proof does not verify. Nothing may be emitted.
    #[error("local verification of the generated proof failed")]
    LocalVerification,
    #[error("artifacts were generated for the {expected:?} circuit, input is for {actual:?}")]
    KindMismatch {
        expected: CircuitKind,
        actual: CircuitKind,
    },
}

impl From<SynthesisError> for HandshakeError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Unsatisfiable => Self::Unsatisfiable,
            other => Self::Proving(other),
        }
    }
}

pub struct ProverParams {
    pub pk: ProvingKey<Bn254>,
    pub vk: VerifyingKey<Bn254>,
}

/// Proof plus the instance it was generated for.
#[derive(Clone, Debug)]
pub struct GeneratedProof {
    pub kind: CircuitKind,
    pub proof: Proof<Bn254>,
    pub public_inputs: Vec<Fr>,
}

impl GeneratedProof {
    pub fn solidity_call(&self) -> SolidityCall {
        SolidityCall::new(&self.proof, &self.public_inputs)
    }

    pub fn bundle(&self) -> anyhow::Result<ProofBundle> {
        ProofBundle::new(self.kind, &self.proof, &self.public_inputs)
    }
}

pub fn setup_minimal<R: RngCore + CryptoRng>(rng: &mut R) -> Result<ProverParams, HandshakeError> {
    setup(MinimalCircuit::blank(), rng)
}

pub fn setup_binding<R: RngCore + CryptoRng>(
    profile: CertificateProfile,
    rng: &mut R,
) -> Result<ProverParams, HandshakeError> {
    setup(CertificateBindingCircuit::blank(profile)?, rng)
}

fn setup<C, R>(circuit: C, rng: &mut R) -> Result<ProverParams, HandshakeError>
where
    C: ConstraintSynthesizer<Fr>,
    R: RngCore + CryptoRng,
{
    let started = Instant::now();
    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        public_inputs = pk.vk.gamma_abc_g1.len().saturating_sub(1),
        "generated groth16 keys"
    );
    let vk = pk.vk.clone();
    Ok(ProverParams { pk, vk })
}

/// Persist keys, descriptor and verifier contract into `dir`, manifest last.
///
/// Every file goes through a temp-file rename, and the manifest is only
/// written once the files it lists exist, so an interrupted run never leaves
/// a loadable but incomplete artifact set.
pub fn write_artifacts(
    dir: &Path,
    descriptor: &CircuitDescriptor,
    params: &ProverParams,
    created_at_unix: u64,
) -> anyhow::Result<ArtifactManifest> {
    use anyhow::Context;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;
    let descriptor_json =
        serde_json::to_vec_pretty(descriptor).context("failed to serialize circuit descriptor")?;
    let circuit = write_artifact(dir, CIRCUIT_FILE, &descriptor_json)?;
    let pk = write_artifact(dir, PROVING_KEY_FILE, &serialize_proving_key(&params.pk)?)?;
    let vk = write_artifact(dir, VERIFYING_KEY_FILE, &serialize_verifying_key(&params.vk)?)?;
    let contract = export_solidity_verifier(&params.vk);
    let verifier_contract = write_artifact(dir, VERIFIER_CONTRACT_FILE, contract.as_bytes())?;

    let manifest = ArtifactManifest {
        manifest_version: MANIFEST_VERSION,
        circuit_version: descriptor.circuit_version,
        kind: descriptor.kind,
        created_at_unix,
        circuit,
        pk,
        vk,
        verifier_contract: Some(verifier_contract),
    };
    write_manifest(dir.join(MANIFEST_FILE), &manifest)?;
    tracing::info!(
        dir = %dir.display(),
        kind = ?descriptor.kind,
        pk_bytes = manifest.pk.size,
        "wrote circuit artifacts"
    );
    Ok(manifest)
}

/// Prove the minimal circuit and check the proof before returning it.
pub fn prove_minimal<R: RngCore + CryptoRng>(
    pk: &ProvingKey<Bn254>,
    input: MinimalCircuitInput,
    rng: &mut R,
) -> Result<GeneratedProof, HandshakeError> {
    let public_inputs = input.public.public_inputs();
    let circuit = MinimalCircuit::new(input.public, input.witness)?;
    prove_checked(CircuitKind::Minimal, pk, circuit, public_inputs, rng)
}

/// Prove the binding circuit and check the proof before returning it.
///
/// The witness is replayed on the host first, so layout mistakes are reported
/// by stage instead of as an unusable proof.
pub fn prove_binding<R: RngCore + CryptoRng>(
    pk: &ProvingKey<Bn254>,
    profile: CertificateProfile,
    input: BindingCircuitInput,
    rng: &mut R,
) -> Result<GeneratedProof, HandshakeError> {
    input.witness.preflight(&profile, &input.public)?;
    let public_inputs = input.public.public_inputs();
    let circuit = CertificateBindingCircuit::new(profile, input.public, input.witness)?;
    prove_checked(CircuitKind::Binding, pk, circuit, public_inputs, rng)
}

/// Input for whichever circuit a set of artifacts was generated for.
#[derive(Clone, Debug)]
pub enum CircuitInput {
    Minimal(MinimalCircuitInput),
    Binding(BindingCircuitInput),
}

impl CircuitInput {
    pub fn kind(&self) -> CircuitKind {
        match self {
            Self::Minimal(_) => CircuitKind::Minimal,
            Self::Binding(_) => CircuitKind::Binding,
        }
    }
}

/// Prove against loaded artifacts, dispatching on the circuit they describe.
pub fn prove_with_artifacts<R: RngCore + CryptoRng>(
    artifacts: &ProverArtifacts,
    input: CircuitInput,
    rng: &mut R,
) -> Result<GeneratedProof, HandshakeError> {
    let expected = artifacts.descriptor.kind;
    if input.kind() != expected {
        return Err(HandshakeError::KindMismatch {
            expected,
            actual: input.kind(),
        });
    }
    match input {
        CircuitInput::Minimal(input) => prove_minimal(&artifacts.pk, input, rng),
        CircuitInput::Binding(input) => {
            let profile = artifacts
                .descriptor
                .profile
                .clone()
                .ok_or_else(|| CircuitError::Profile("descriptor carries no profile".into()))?;
            prove_binding(&artifacts.pk, profile, input, rng)
        }
    }
}

/// Synthesize once, refuse an unsatisfied witness, then prove from the
/// recorded assignment and verify the result locally.
fn prove_checked<C, R>(
    kind: CircuitKind,
    pk: &ProvingKey<Bn254>,
    circuit: C,
    public_inputs: Vec<Fr>,
    rng: &mut R,
) -> Result<GeneratedProof, HandshakeError>
where
    C: ConstraintSynthesizer<Fr>,
    R: RngCore + CryptoRng,
{
    let started = Instant::now();
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    circuit.generate_constraints(cs.clone())?;
    if !cs.is_satisfied()? {
        tracing::warn!(?kind, "witness does not satisfy the circuit");
        return Err(HandshakeError::Unsatisfiable);
    }
    cs.finalize();
    let matrices = cs
        .to_matrices()
        .ok_or(HandshakeError::Proving(SynthesisError::MissingCS))?;
    let num_inputs = cs.num_instance_variables();
    let num_constraints = cs.num_constraints();
    let full_assignment = {
        let system = cs.borrow().ok_or(SynthesisError::MissingCS)?;
        [system.instance_assignment.as_slice(), system.witness_assignment.as_slice()].concat()
    };

    let r = Fr::rand(rng);
    let s = Fr::rand(rng);
    let proof = Groth16::<Bn254>::create_proof_with_reduction_and_matrices(
        pk,
        r,
        s,
        &matrices,
        num_inputs,
        num_constraints,
        &full_assignment,
    )?;
    tracing::info!(
        ?kind,
        constraints = num_constraints,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "generated proof"
    );
    verify_local(&pk.vk, &proof, &public_inputs)?;
    Ok(GeneratedProof {
        kind,
        proof,
        public_inputs,
    })
}

/// Sanity check before anything leaves the process.
///
/// Satisfiability is already checked before proving. This catches a proof
/// that does not match the verifying key or the instance it is returned with.
pub fn verify_local(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<(), HandshakeError> {
    match eidas_verifier::verify(vk, proof, public_inputs) {
        Ok(true) => {
            tracing::info!("local verification passed");
            Ok(())
        }
        Ok(false) => {
            tracing::warn!("local verification rejected the generated proof");
            Err(HandshakeError::LocalVerification)
        }
        Err(err) => {
            tracing::warn!(error = %err, "local verification errored");
            Err(HandshakeError::LocalVerification)
        }
    }
}
