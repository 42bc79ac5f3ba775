// eidas/eidas-circuit/src/binding.rs
// Numan Thabit 2025

//! Full certificate-binding circuit.
//!
//! Proves that the 11-byte subject sits inside a certificate whose TBS body
//! is signed by the issuer key, that the signature verified is byte-for-byte
//! the one embedded in the certificate, and that the certificate's subject key
//! signed the session challenge. The certificate buffer is fully determined:
//! the TBS body, the signature and the fixed envelope bytes between them.

use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    curve::{self, P384Params},
    gadgets::{
        bytes::{alloc_private_bytes, alloc_public_bytes},
        ecdsa::verify_ecdsa,
        layout::{
            assert_constant_bytes, assert_subsequence, constant_bytes_match, subsequence_matches,
        },
        limbs::emulated_from_be_bytes,
        point::AffinePointVar,
        signature::{encode_signature, SignatureVar},
    },
    profile::{CertificateProfile, SignatureEncoding, PUBKEY_LEN, SUBJECT_LEN},
    witness::{check_len, hex_array, hex_vec, EcdsaSignature},
    byte_instances, CircuitError, ConstraintF, ScalarVar, BINDING_CHALLENGE_LEN,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingPublicInputs {
    /// Liveness nonce signed by the card.
    #[serde(with = "hex_array")]
    pub challenge: [u8; BINDING_CHALLENGE_LEN],
    /// Identifier taken from the certificate subject.
    #[serde(with = "hex_array")]
    pub subject: [u8; SUBJECT_LEN],
}

impl BindingPublicInputs {
    /// Instance vector: challenge bytes then subject bytes, one element each.
    pub fn public_inputs(&self) -> Vec<ConstraintF> {
        let mut out = byte_instances(&self.challenge);
        out.extend(byte_instances(&self.subject));
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingWitness {
    pub challenge_signature: EcdsaSignature,
    /// Full DER certificate including its signature.
    #[serde(with = "hex_vec")]
    pub certificate: Vec<u8>,
    /// TBS body, the input of the issuer's digest.
    #[serde(with = "hex_vec")]
    pub tbs_certificate: Vec<u8>,
    #[serde(with = "hex_vec")]
    pub subject_pubkey: Vec<u8>,
    /// Self-signed certificates use the subject key here as well.
    #[serde(with = "hex_vec")]
    pub issuer_pubkey: Vec<u8>,
    pub certificate_signature: EcdsaSignature,
}

impl BindingWitness {
    /// Host-side replay of the layout and signature checks.
    ///
    /// Only reports which stage disagrees, never the offending values. The
    /// circuit stays the authority; this just fails before a long proving run.
    pub fn preflight(
        &self,
        profile: &CertificateProfile,
        public: &BindingPublicInputs,
    ) -> Result<(), CircuitError> {
        if !subsequence_matches("subject", &self.tbs_certificate, &public.subject, profile.subject)? {
            return Err(CircuitError::Profile("subject not found at its TBS offset".into()));
        }
        if !subsequence_matches(
            "subject pubkey",
            &self.tbs_certificate,
            &self.subject_pubkey,
            profile.subject_pubkey,
        )? {
            return Err(CircuitError::Profile("subject key not found at its TBS offset".into()));
        }
        if !subsequence_matches("tbs", &self.certificate, &self.tbs_certificate, profile.tbs)? {
            return Err(CircuitError::Profile("tbs body not found at its certificate offset".into()));
        }
        if !constant_bytes_match(
            "envelope",
            &self.certificate,
            &profile.envelope_positions(),
            &profile.envelope,
        )? {
            return Err(CircuitError::Profile("certificate envelope differs from profile".into()));
        }
        let encoded =
            encode_signature_bytes(&self.certificate_signature, profile.signature_encoding);
        if !subsequence_matches("signature", &self.certificate, &encoded, profile.signature)? {
            return Err(CircuitError::Profile(
                "certificate signature not found at its offset".into(),
            ));
        }
        curve::affine_from_sec1(&self.subject_pubkey)
            .ok_or(CircuitError::InvalidPoint("subject pubkey"))?;
        curve::affine_from_sec1(&self.issuer_pubkey)
            .ok_or(CircuitError::InvalidPoint("issuer pubkey"))?;
        Ok(())
    }
}

/// Host mirror of the in-circuit signature encoding.
pub fn encode_signature_bytes(signature: &EcdsaSignature, encoding: SignatureEncoding) -> Vec<u8> {
    let prefix = encoding.prefix();
    let mut out = Vec::with_capacity(encoding.encoded_len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&signature.r);
    out.extend_from_slice(prefix);
    out.extend_from_slice(&signature.s);
    out
}

/// Combined input, the JSON shape consumed by the prover CLI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingCircuitInput {
    pub public: BindingPublicInputs,
    pub witness: BindingWitness,
}

#[derive(Clone, Debug)]
pub struct CertificateBindingCircuit {
    profile: CertificateProfile,
    params: P384Params,
    public: BindingPublicInputs,
    witness: Option<BindingWitness>,
}

impl CertificateBindingCircuit {
    /// Validate the profile and the witness widths, so shape problems surface
    /// here and not as an unsatisfiable proof.
    pub fn new(
        profile: CertificateProfile,
        public: BindingPublicInputs,
        witness: BindingWitness,
    ) -> Result<Self, CircuitError> {
        profile.validate()?;
        check_len("certificate", &witness.certificate, profile.cert_len)?;
        check_len("tbs certificate", &witness.tbs_certificate, profile.tbs_len)?;
        check_len("subject pubkey", &witness.subject_pubkey, PUBKEY_LEN)?;
        check_len("issuer pubkey", &witness.issuer_pubkey, PUBKEY_LEN)?;
        witness.challenge_signature.scalars()?;
        witness.certificate_signature.scalars()?;
        Ok(Self {
            profile,
            params: P384Params::p384().clone(),
            public,
            witness: Some(witness),
        })
    }

    /// Circuit shape without assignments, for key generation.
    pub fn blank(profile: CertificateProfile) -> Result<Self, CircuitError> {
        profile.validate()?;
        Ok(Self {
            profile,
            params: P384Params::p384().clone(),
            public: BindingPublicInputs {
                challenge: [0; BINDING_CHALLENGE_LEN],
                subject: [0; SUBJECT_LEN],
            },
            witness: None,
        })
    }

    pub fn profile(&self) -> &CertificateProfile {
        &self.profile
    }

    pub fn public(&self) -> &BindingPublicInputs {
        &self.public
    }

    fn synthesize(self, cs: ConstraintSystemRef<ConstraintF>) -> Result<(), CircuitError> {
        let Self {
            profile,
            params,
            public,
            witness,
        } = self;
        let w = witness.as_ref();

        // public inputs first, so the instance order is challenge || subject
        let challenge = alloc_public_bytes(cs.clone(), &public.challenge)?;
        let subject = alloc_public_bytes(cs.clone(), &public.subject)?;

        let certificate = alloc_private_bytes(
            cs.clone(),
            w.map(|w| w.certificate.as_slice()),
            profile.cert_len,
        )?;
        let tbs = alloc_private_bytes(
            cs.clone(),
            w.map(|w| w.tbs_certificate.as_slice()),
            profile.tbs_len,
        )?;
        let subject_pubkey =
            alloc_private_bytes(cs.clone(), w.map(|w| w.subject_pubkey.as_slice()), PUBKEY_LEN)?;
        let issuer_pubkey =
            alloc_private_bytes(cs.clone(), w.map(|w| w.issuer_pubkey.as_slice()), PUBKEY_LEN)?;
        let certificate_signature = SignatureVar::new_witness(
            cs.clone(),
            w.map(|w| w.certificate_signature.scalars()).transpose()?,
        )?;
        let challenge_signature = SignatureVar::new_witness(
            cs.clone(),
            w.map(|w| w.challenge_signature.scalars()).transpose()?,
        )?;

        // 1. subject and subject key sit at their TBS offsets
        assert_subsequence("subject", &tbs, &subject, profile.subject)?;
        assert_subsequence("subject pubkey", &tbs, &subject_pubkey, profile.subject_pubkey)?;

        // the hashed TBS is this certificate's body, every other byte but the
        // signature is fixed
        assert_subsequence("tbs", &certificate, &tbs, profile.tbs)?;
        assert_constant_bytes(
            "envelope",
            &certificate,
            &profile.envelope_positions(),
            &profile.envelope,
        )?;

        // 2. issuer key as an emulated point
        let issuer_point = AffinePointVar::from_sec1_bytes(&issuer_pubkey)?;

        // 3. TBS digest as a scalar message
        let digest = Sha256Gadget::digest(&tbs)?;
        let digest_message: ScalarVar = emulated_from_be_bytes(&digest.0)?;

        // 4. issuer signed the TBS body
        verify_ecdsa(&params, &issuer_point, &digest_message, &certificate_signature)?;

        // 5. the verified signature is the one embedded in the certificate
        let encoded = encode_signature(&certificate_signature, profile.signature_encoding)?;
        assert_subsequence("signature", &certificate, &encoded, profile.signature)?;

        // 6. subject key as an emulated point
        let subject_point = AffinePointVar::from_sec1_bytes(&subject_pubkey)?;

        // 7. subject key signed the challenge
        let challenge_message: ScalarVar = emulated_from_be_bytes(&challenge)?;
        verify_ecdsa(&params, &subject_point, &challenge_message, &challenge_signature)?;

        tracing::debug!(
            constraints = cs.num_constraints(),
            instances = cs.num_instance_variables(),
            "synthesized certificate binding circuit"
        );
        Ok(())
    }
}

impl ConstraintSynthesizer<ConstraintF> for CertificateBindingCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<ConstraintF>) -> Result<(), SynthesisError> {
        self.synthesize(cs).map_err(SynthesisError::from)
    }
}

/// SHA-256 of the TBS body, as the issuer signs it.
pub fn tbs_digest(tbs: &[u8]) -> [u8; 32] {
    Sha256::digest(tbs).into()
}
