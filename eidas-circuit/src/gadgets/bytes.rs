// eidas/eidas-circuit/src/gadgets/bytes.rs
// Numan Thabit 2025

use ark_ff::PrimeField;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Allocate each byte as its own public input.
///
/// `UInt8::new_input_vec` packs 31 bytes per field element, which would not
/// match the one-input-per-byte arity the on-chain verifier expects. Here every
/// byte becomes one instance variable, bound to an 8-bit witness decomposition.
pub fn alloc_public_bytes<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    values: &[u8],
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    values
        .iter()
        .map(|value| {
            let byte = UInt8::new_witness(cs.clone(), || Ok(*value))?;
            let input = FpVar::new_input(cs.clone(), || Ok(F::from(*value as u64)))?;
            byte.to_fp()?.enforce_equal(&input)?;
            Ok(byte)
        })
        .collect()
}

/// Allocate `len` private bytes. `values` is `None` during key generation.
pub fn alloc_private_bytes<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    values: Option<&[u8]>,
    len: usize,
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    (0..len)
        .map(|i| {
            UInt8::new_witness(cs.clone(), || {
                values
                    .and_then(|bytes| bytes.get(i).copied())
                    .ok_or(SynthesisError::AssignmentMissing)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstraintF;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn public_bytes_are_one_input_each() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let bytes = alloc_public_bytes(cs.clone(), b"0123456789abcdef").unwrap();
        assert_eq!(bytes.len(), 16);
        // instance 0 is the constant one
        assert_eq!(cs.num_instance_variables(), 17);
        assert_eq!(bytes.value().unwrap(), b"0123456789abcdef".to_vec());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn private_bytes_without_values_fail_in_prove_mode() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        assert_eq!(
            alloc_private_bytes(cs, None, 4).unwrap_err(),
            SynthesisError::AssignmentMissing
        );
    }
}
