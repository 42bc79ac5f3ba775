// eidas/eidas-circuit/src/lib.rs
// Numan Thabit 2025

pub mod binding;
pub mod curve;
pub mod gadgets;
pub mod minimal;
pub mod profile;
pub mod witness;

use ark_r1cs_std::fields::emulated_fp::EmulatedFpVar;
use ark_relations::r1cs::SynthesisError;
use thiserror::Error;

pub use binding::{BindingCircuitInput, BindingPublicInputs, BindingWitness, CertificateBindingCircuit};
pub use minimal::{MinimalCircuit, MinimalCircuitInput, MinimalPublicInputs, MinimalWitness};
pub use profile::{ByteRange, CertificateProfile, SignatureEncoding};
pub use witness::EcdsaSignature;

/// Native field of the proving system (BN254 scalar field).
pub type ConstraintF = ark_bn254::Fr;
/// Emulated P-384 coordinate.
pub type FqVar = EmulatedFpVar<curve::Fq, ConstraintF>;
/// Emulated P-384 scalar.
pub type ScalarVar = EmulatedFpVar<curve::Fr, ConstraintF>;

/// Challenge width of the certificate-binding circuit.
pub const BINDING_CHALLENGE_LEN: usize = 16;
/// Challenge width of the minimal circuit, one public input per byte.
pub const MINIMAL_CHALLENGE_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CircuitError {
    /// Offsets or field widths of the certificate profile are inconsistent.
    #[error("certificate profile error: {0}")]
    Profile(String),
    /// A needle does not have the width its layout slot expects.
    #[error("layout error in {field}: expected {expected} bytes at offset {offset}, got {actual}")]
    Layout {
        field: &'static str,
        offset: usize,
        expected: usize,
        actual: usize,
    },
    /// A byte string is too wide for the emulated field it should become.
    #[error("length mismatch: at most {max} bytes fit, got {actual}")]
    LengthMismatch { max: usize, actual: usize },
    #[error("invalid {0}: not a canonical P-384 scalar")]
    InvalidScalar(&'static str),
    #[error("invalid {0}: not an uncompressed P-384 point")]
    InvalidPoint(&'static str),
    #[error("witness buffer {field} must be {expected} bytes, got {actual}")]
    WitnessLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

impl From<CircuitError> for SynthesisError {
    fn from(err: CircuitError) -> Self {
        match err {
            CircuitError::Synthesis(inner) => inner,
            other => {
                tracing::error!(error = %other, "circuit shape rejected during synthesis");
                SynthesisError::Unsatisfiable
            }
        }
    }
}

/// Public inputs as BN254 field elements, one per byte, in allocation order.
pub fn byte_instances(bytes: &[u8]) -> Vec<ConstraintF> {
    bytes.iter().map(|b| ConstraintF::from(*b as u64)).collect()
}
