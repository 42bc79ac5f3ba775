// eidas/eidas-circuit/src/minimal.rs
// Numan Thabit 2025

//! Reduced circuit: only the challenge signature is verified.
//!
//! The subject key is a private witness and the 32 challenge bytes are the
//! whole instance, so the on-chain verifier takes 32 inputs.

use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

use crate::{
    curve::{self, P384Params},
    gadgets::{
        bytes::{alloc_private_bytes, alloc_public_bytes},
        ecdsa::verify_ecdsa,
        limbs::emulated_from_be_bytes,
        point::AffinePointVar,
        signature::SignatureVar,
    },
    profile::PUBKEY_LEN,
    witness::{check_len, hex_array, hex_vec, EcdsaSignature},
    byte_instances, CircuitError, ConstraintF, ScalarVar, MINIMAL_CHALLENGE_LEN,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalPublicInputs {
    #[serde(with = "hex_array")]
    pub challenge: [u8; MINIMAL_CHALLENGE_LEN],
}

impl MinimalPublicInputs {
    pub fn public_inputs(&self) -> Vec<ConstraintF> {
        byte_instances(&self.challenge)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalWitness {
    #[serde(with = "hex_vec")]
    pub subject_pubkey: Vec<u8>,
    pub challenge_signature: EcdsaSignature,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinimalCircuitInput {
    pub public: MinimalPublicInputs,
    pub witness: MinimalWitness,
}

#[derive(Clone, Debug)]
pub struct MinimalCircuit {
    params: P384Params,
    public: MinimalPublicInputs,
    witness: Option<MinimalWitness>,
}

impl MinimalCircuit {
    pub fn new(public: MinimalPublicInputs, witness: MinimalWitness) -> Result<Self, CircuitError> {
        check_len("subject pubkey", &witness.subject_pubkey, PUBKEY_LEN)?;
        curve::affine_from_sec1(&witness.subject_pubkey)
            .ok_or(CircuitError::InvalidPoint("subject pubkey"))?;
        witness.challenge_signature.scalars()?;
        Ok(Self {
            params: P384Params::p384().clone(),
            public,
            witness: Some(witness),
        })
    }

    pub fn blank() -> Self {
        Self {
            params: P384Params::p384().clone(),
            public: MinimalPublicInputs {
                challenge: [0; MINIMAL_CHALLENGE_LEN],
            },
            witness: None,
        }
    }

    pub fn public(&self) -> &MinimalPublicInputs {
        &self.public
    }

    fn synthesize(self, cs: ConstraintSystemRef<ConstraintF>) -> Result<(), CircuitError> {
        let w = self.witness.as_ref();
        let challenge = alloc_public_bytes(cs.clone(), &self.public.challenge)?;
        let pubkey =
            alloc_private_bytes(cs.clone(), w.map(|w| w.subject_pubkey.as_slice()), PUBKEY_LEN)?;
        let signature = SignatureVar::new_witness(
            cs.clone(),
            w.map(|w| w.challenge_signature.scalars()).transpose()?,
        )?;

        let point = AffinePointVar::from_sec1_bytes(&pubkey)?;
        let message: ScalarVar = emulated_from_be_bytes(&challenge)?;
        verify_ecdsa(&self.params, &point, &message, &signature)?;

        tracing::debug!(
            constraints = cs.num_constraints(),
            instances = cs.num_instance_variables(),
            "synthesized minimal circuit"
        );
        Ok(())
    }
}

impl ConstraintSynthesizer<ConstraintF> for MinimalCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<ConstraintF>) -> Result<(), SynthesisError> {
        self.synthesize(cs).map_err(SynthesisError::from)
    }
}
