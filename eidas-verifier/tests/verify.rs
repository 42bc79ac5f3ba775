use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, ProvingKey};
use ark_relations::{
    lc,
    r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable},
};
use eidas_common::{fr_to_decimal, CircuitKind, ProofBundle, SolidityCall};
use eidas_verifier::{
    export_solidity_verifier, verify, verify_bundle, verify_solidity_call_json,
    verify_solidity_shaped,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Public inputs only, each tied to itself by one constraint. Enough to give
/// the verifying key a realistic arity without synthesizing the real circuit.
#[derive(Clone)]
struct EchoCircuit {
    inputs: Vec<Fr>,
}

impl ConstraintSynthesizer<Fr> for EchoCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        for value in self.inputs {
            let var = cs.new_input_variable(|| Ok(value))?;
            cs.enforce_constraint(lc!() + var, lc!() + Variable::One, lc!() + var)?;
        }
        Ok(())
    }
}

fn challenge_inputs() -> Vec<Fr> {
    b"0123456789abcdef0123456789abcdef"
        .iter()
        .map(|b| Fr::from(*b as u64))
        .collect()
}

fn setup_and_prove(inputs: &[Fr]) -> (ProvingKey<Bn254>, Proof<Bn254>) {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let circuit = EchoCircuit {
        inputs: inputs.to_vec(),
    };
    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit.clone(), &mut rng)
        .unwrap();
    let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, &pk, &mut rng).unwrap();
    (pk, proof)
}

#[test]
fn accepts_matching_instance() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    assert!(verify(&pk.vk, &proof, &inputs).unwrap());
}

#[test]
fn rejects_altered_instance() {
    let mut inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    inputs[5] += Fr::from(1u64);
    assert!(!verify(&pk.vk, &proof, &inputs).unwrap());
}

#[test]
fn wrong_arity_is_an_error() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    assert!(verify(&pk.vk, &proof, &inputs[..27]).is_err());
}

#[test]
fn bundle_round_trip_verifies() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    let bundle = ProofBundle::new(CircuitKind::Minimal, &proof, &inputs).unwrap();
    let json = serde_json::to_string(&bundle).unwrap();
    let bundle: ProofBundle = serde_json::from_str(&json).unwrap();
    assert!(verify_bundle(&pk.vk, &bundle).unwrap());
}

#[test]
fn solidity_call_verifies_like_the_contract() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    let call = SolidityCall::new(&proof, &inputs);
    assert!(verify_solidity_shaped(&pk.vk, &call.proof, &call.input).unwrap());

    let json = serde_json::to_string(&call).unwrap();
    assert!(verify_solidity_call_json(&pk.vk, &json).unwrap());
}

#[test]
fn solidity_call_rejects_tampered_input() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    let mut call = SolidityCall::new(&proof, &inputs);
    call.input[0] = "999".into();
    assert!(!verify_solidity_shaped(&pk.vk, &call.proof, &call.input).unwrap());
}

#[test]
fn solidity_call_rejects_unreduced_input() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    let mut call = SolidityCall::new(&proof, &inputs);
    // scalar modulus itself, the contract's SNARK_SCALAR_FIELD bound
    call.input[0] =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617".into();
    assert!(!verify_solidity_shaped(&pk.vk, &call.proof, &call.input).unwrap());
}

#[test]
fn solidity_call_rejects_wrong_arity_and_bad_points() {
    let inputs = challenge_inputs();
    let (pk, proof) = setup_and_prove(&inputs);
    let mut call = SolidityCall::new(&proof, &inputs);
    call.input.pop();
    assert!(!verify_solidity_shaped(&pk.vk, &call.proof, &call.input).unwrap());

    let mut call = SolidityCall::new(&proof, &inputs);
    call.proof.a[1] = "1".into();
    assert!(!verify_solidity_shaped(&pk.vk, &call.proof, &call.input).unwrap());
}

#[test]
fn exported_contract_embeds_key_and_arity() {
    let inputs = challenge_inputs();
    let (pk, _) = setup_and_prove(&inputs);
    let source = export_solidity_verifier(&pk.vk);
    assert!(source.contains("uint256[32] calldata input"));
    assert!(source.contains("uint256 constant IC32_X"));
    assert_eq!(fr_to_decimal(&inputs[0]), "48");
}

#[test]
#[ignore = "groth16 setup over the emulated P-384 circuit"]
fn minimal_fixture_proof_verifies_on_every_path() {
    let fixtures = eidas_test_fixtures::minimal_fixtures();
    let generated = fixtures.proof();
    let vk = &fixtures.params().vk;
    assert!(verify(vk, &generated.proof, &generated.public_inputs).unwrap());

    let call = generated.solidity_call();
    assert_eq!(call.input.len(), 32);
    assert!(verify_solidity_shaped(vk, &call.proof, &call.input).unwrap());

    let mut tampered = call.clone();
    tampered.input[0] = "999".into();
    assert!(!verify_solidity_shaped(vk, &tampered.proof, &tampered.input).unwrap());
}
