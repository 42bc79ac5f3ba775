use std::fs;

use ark_bn254::Fr;
use ark_relations::{
    lc,
    r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable},
};
use eidas_common::{
    load_prover_artifacts, load_verifier_artifacts, CircuitDescriptor, CircuitKind,
    VERIFYING_KEY_FILE,
};
use eidas_prover::{
    prove_minimal, prove_with_artifacts, verify_local, write_artifacts, CircuitInput,
    HandshakeError, ProverParams,
};
use eidas_test_fixtures::{binding_input, minimal_fixtures, minimal_input};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Keys with the minimal circuit's arity, cheap enough for artifact IO tests.
struct EchoCircuit(usize);

impl ConstraintSynthesizer<Fr> for EchoCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        for i in 0..self.0 {
            let var = cs.new_input_variable(|| Ok(Fr::from(i as u64)))?;
            cs.enforce_constraint(lc!() + var, lc!() + Variable::One, lc!() + var)?;
        }
        Ok(())
    }
}

fn echo_params(inputs: usize) -> ProverParams {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let pk = ark_groth16::Groth16::<ark_bn254::Bn254>::generate_random_parameters_with_reduction(
        EchoCircuit(inputs),
        &mut rng,
    )
    .unwrap();
    let vk = pk.vk.clone();
    ProverParams { pk, vk }
}

#[test]
fn written_artifacts_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let params = echo_params(32);
    let manifest = write_artifacts(dir.path(), &CircuitDescriptor::minimal(), &params, 1).unwrap();
    assert_eq!(manifest.kind, CircuitKind::Minimal);
    assert!(manifest.verifier_contract.is_some());
    assert!(dir.path().join("Verifier.sol").exists());

    let manifest_path = dir.path().join("manifest.json");
    let prover = load_prover_artifacts(&manifest_path).unwrap();
    assert_eq!(prover.vk, params.vk);
    let verifier = load_verifier_artifacts(&manifest_path).unwrap();
    assert_eq!(verifier.descriptor, CircuitDescriptor::minimal());
}

#[test]
fn tampered_verifying_key_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path(), &CircuitDescriptor::minimal(), &echo_params(32), 1).unwrap();
    let vk_path = dir.path().join(VERIFYING_KEY_FILE);
    let mut bytes = fs::read(&vk_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&vk_path, bytes).unwrap();
    assert!(load_verifier_artifacts(dir.path().join("manifest.json")).is_err());
}

#[test]
fn keys_with_wrong_arity_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path(), &CircuitDescriptor::minimal(), &echo_params(27), 1).unwrap();
    let err = load_prover_artifacts(dir.path().join("manifest.json")).unwrap_err();
    assert!(err.to_string().contains("public inputs"));
}

#[test]
fn kind_mismatch_is_caught_before_proving() {
    let dir = tempfile::tempdir().unwrap();
    write_artifacts(dir.path(), &CircuitDescriptor::minimal(), &echo_params(32), 1).unwrap();
    let artifacts = load_prover_artifacts(dir.path().join("manifest.json")).unwrap();
    let err = prove_with_artifacts(
        &artifacts,
        CircuitInput::Binding(binding_input().unwrap()),
        &mut ChaCha20Rng::seed_from_u64(1),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::KindMismatch {
            expected: CircuitKind::Minimal,
            actual: CircuitKind::Binding,
        }
    ));
}

#[test]
fn unrelated_proof_fails_local_verification() {
    let params = echo_params(32);
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let proof = ark_groth16::Groth16::<ark_bn254::Bn254>::create_random_proof_with_reduction(
        EchoCircuit(32),
        &params.pk,
        &mut rng,
    )
    .unwrap();
    let honest: Vec<Fr> = (0..32u64).map(Fr::from).collect();
    verify_local(&params.vk, &proof, &honest).unwrap();

    let mut forged = honest.clone();
    forged[0] = Fr::from(999u64);
    assert!(matches!(
        verify_local(&params.vk, &proof, &forged),
        Err(HandshakeError::LocalVerification)
    ));
}

#[test]
#[ignore = "groth16 setup over the emulated P-384 circuit"]
fn minimal_round_trip_through_artifacts() {
    let fixtures = minimal_fixtures();
    let artifacts = load_prover_artifacts(fixtures.manifest_path()).unwrap();
    let generated = prove_with_artifacts(
        &artifacts,
        CircuitInput::Minimal(minimal_input().unwrap()),
        &mut ChaCha20Rng::seed_from_u64(9),
    )
    .unwrap();
    assert_eq!(generated.public_inputs.len(), 32);
    let bundle = generated.bundle().unwrap();
    assert!(eidas_verifier::verify_bundle(&artifacts.vk, &bundle).unwrap());
}

#[test]
#[ignore = "groth16 setup over the emulated P-384 circuit"]
fn unsatisfied_witness_is_never_returned() {
    let fixtures = minimal_fixtures();
    let mut input = minimal_input().unwrap();
    input.public.challenge[0] ^= 0x01;
    let err = prove_minimal(&fixtures.params().pk, input, &mut ChaCha20Rng::seed_from_u64(9))
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Unsatisfiable));
}
