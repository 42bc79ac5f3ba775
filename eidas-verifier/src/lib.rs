// eidas/eidas-verifier/src/lib.rs
// Numan Thabit 2025

pub mod solidity;

use anyhow::{ensure, Context, Result};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{prepare_verifying_key, Groth16, Proof, VerifyingKey};
use eidas_common::{ProofBundle, SolidityCall, SolidityProof};

pub use solidity::export_solidity_verifier;

/// Groth16 verification against an instance vector.
///
/// An instance of the wrong length is an error, not a rejection, so callers
/// can tell a mismatched verifying key from a bad proof.
pub fn verify(vk: &VerifyingKey<Bn254>, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> Result<bool> {
    let expected = vk.gamma_abc_g1.len().saturating_sub(1);
    ensure!(
        public_inputs.len() == expected,
        "verifying key expects {} public inputs, got {}",
        expected,
        public_inputs.len()
    );
    let pvk = prepare_verifying_key(vk);
    let accepted = Groth16::<Bn254>::verify_proof(&pvk, proof, public_inputs)
        .context("groth16 verification errored")?;
    tracing::debug!(accepted, "verified groth16 proof");
    Ok(accepted)
}

pub fn verify_bundle(vk: &VerifyingKey<Bn254>, bundle: &ProofBundle) -> Result<bool> {
    let proof = bundle.proof()?;
    let public_inputs = bundle.public_inputs()?;
    verify(vk, &proof, &public_inputs)
}

/// Same decision the deployed contract's `verifyProof(a, b, c, input)` makes.
///
/// Inputs at or above the scalar modulus, malformed points and a wrong input
/// count are rejections, as they are on chain.
pub fn verify_solidity_shaped(
    vk: &VerifyingKey<Bn254>,
    proof: &SolidityProof,
    input: &[String],
) -> Result<bool> {
    let expected = vk.gamma_abc_g1.len().saturating_sub(1);
    if input.len() != expected {
        tracing::warn!(expected, actual = input.len(), "input array has wrong arity");
        return Ok(false);
    }
    let call = SolidityCall {
        proof: proof.clone(),
        input: input.to_vec(),
    };
    let public_inputs = match call.public_inputs() {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!(error = %err, "public input outside the scalar field");
            return Ok(false);
        }
    };
    let proof = match proof.to_proof() {
        Ok(proof) => proof,
        Err(err) => {
            tracing::warn!(error = %err, "proof tuple does not decode to curve points");
            return Ok(false);
        }
    };
    verify(vk, &proof, &public_inputs)
}

/// Parse a `GENERATED` payload and check it.
pub fn verify_solidity_call_json(vk: &VerifyingKey<Bn254>, json: &str) -> Result<bool> {
    let call: SolidityCall = serde_json::from_str(json).context("failed to parse proof tuple json")?;
    verify_solidity_shaped(vk, &call.proof, &call.input)
}
