// eidas/eidas-circuit/src/gadgets/limbs.rs
// Numan Thabit 2025

//! Bridge from big-endian byte strings to emulated P-384 field elements.
//!
//! Bytes are grouped into 64-bit limbs, most significant limb first, with
//! zero padding on the left. The emulated element is allocated as a witness
//! and its canonical bit decomposition is tied back to those limbs, so the
//! element equals the integer the bytes spell out.

use ark_ff::PrimeField;
use ark_r1cs_std::{
    fields::{emulated_fp::EmulatedFpVar, fp::FpVar},
    prelude::*,
};
use ark_relations::r1cs::SynthesisError;

use crate::CircuitError;

pub const LIMB_BYTES: usize = 8;
const LIMB_BITS: usize = 8 * LIMB_BYTES;

/// Host mirror of [`bytes_to_limbs`].
pub fn limb_values(bytes: &[u8]) -> Vec<u64> {
    let padding = (LIMB_BYTES - bytes.len() % LIMB_BYTES) % LIMB_BYTES;
    let mut padded = vec![0u8; padding];
    padded.extend_from_slice(bytes);
    padded
        .chunks(LIMB_BYTES)
        .map(|chunk| {
            let mut limb = [0u8; LIMB_BYTES];
            limb.copy_from_slice(chunk);
            u64::from_be_bytes(limb)
        })
        .collect()
}

/// Pack big-endian bytes into `ceil(len / 8)` native 64-bit limbs, most
/// significant first.
pub fn bytes_to_limbs<F: PrimeField>(bytes: &[UInt8<F>]) -> Result<Vec<FpVar<F>>, SynthesisError> {
    let padding = (LIMB_BYTES - bytes.len() % LIMB_BYTES) % LIMB_BYTES;
    let mut padded = vec![UInt8::constant(0); padding];
    padded.extend_from_slice(bytes);

    padded
        .chunks(LIMB_BYTES)
        .map(|chunk| {
            let mut bits = Vec::with_capacity(LIMB_BITS);
            for byte in chunk.iter().rev() {
                bits.extend(byte.to_bits_le()?);
            }
            Boolean::le_bits_to_fp(&bits)
        })
        .collect()
}

/// Maximum number of big-endian bytes that can describe an element of `T`.
pub fn max_bytes<T: PrimeField>() -> usize {
    (T::MODULUS_BIT_SIZE as usize + 7) / 8
}

/// Build an emulated element of `T` equal to the integer formed by `limbs`.
///
/// More limbs than `T` can hold is a length mismatch. A value that is not
/// below the modulus leaves the constraint system unsatisfiable.
pub fn limbs_to_emulated<T: PrimeField, F: PrimeField>(
    limbs: &[FpVar<F>],
    value: impl FnOnce() -> Result<T, SynthesisError>,
) -> Result<EmulatedFpVar<T, F>, CircuitError> {
    let modulus_bits = T::MODULUS_BIT_SIZE as usize;
    let max_limbs = (modulus_bits + LIMB_BITS - 1) / LIMB_BITS;
    if limbs.len() > max_limbs {
        return Err(CircuitError::LengthMismatch {
            max: max_limbs * LIMB_BYTES,
            actual: limbs.len() * LIMB_BYTES,
        });
    }

    if limbs.is_constant() {
        return Ok(EmulatedFpVar::constant(value()?));
    }

    let element = EmulatedFpVar::new_witness(limbs.cs(), value)?;
    let mut bits = element.to_bits_le()?;
    bits.truncate(modulus_bits);

    // chunks are least significant first, limbs most significant first
    let zero = FpVar::<F>::zero();
    for (i, chunk) in bits.chunks(LIMB_BITS).enumerate() {
        let packed = Boolean::le_bits_to_fp(chunk)?;
        let expected = limbs
            .len()
            .checked_sub(i + 1)
            .map(|idx| &limbs[idx])
            .unwrap_or(&zero);
        packed.enforce_equal(expected)?;
    }
    Ok(element)
}

/// Bytes to emulated field element in one step.
pub fn emulated_from_be_bytes<T: PrimeField, F: PrimeField>(
    bytes: &[UInt8<F>],
) -> Result<EmulatedFpVar<T, F>, CircuitError> {
    let max = max_bytes::<T>();
    if bytes.len() > max {
        return Err(CircuitError::LengthMismatch {
            max,
            actual: bytes.len(),
        });
    }
    let limbs = bytes_to_limbs(bytes)?;
    limbs_to_emulated(&limbs, || {
        bytes
            .value()
            .map(|value| T::from_be_bytes_mod_order(&value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{curve, gadgets::bytes::alloc_private_bytes, ConstraintF};
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn limb_values_pad_on_the_left() {
        assert_eq!(limb_values(&[0x01, 0x02]), vec![0x0102]);
        assert_eq!(
            limb_values(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 2]),
            vec![0x0100, 0x0000_0000_0000_0002]
        );
        assert_eq!(limb_values(&[0xff; 48]).len(), 6);
    }

    #[test]
    fn circuit_limbs_match_host_limbs() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let data: Vec<u8> = (1..=20).collect();
        let bytes = alloc_private_bytes(cs.clone(), Some(&data), data.len()).unwrap();
        let limbs = bytes_to_limbs(&bytes).unwrap();
        let expected: Vec<ConstraintF> = limb_values(&data)
            .into_iter()
            .map(ConstraintF::from)
            .collect();
        assert_eq!(limbs.value().unwrap(), expected);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn emulated_element_equals_integer() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let data = [0xabu8; 32];
        let bytes = alloc_private_bytes(cs.clone(), Some(&data), data.len()).unwrap();
        let element = emulated_from_be_bytes::<curve::Fr, _>(&bytes).unwrap();
        assert_eq!(
            element.value().unwrap(),
            curve::Fr::from_be_bytes_mod_order(&data)
        );
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn too_many_bytes_is_length_mismatch() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let data = [0x01u8; 49];
        let bytes = alloc_private_bytes(cs.clone(), Some(&data), data.len()).unwrap();
        let err = emulated_from_be_bytes::<curve::Fq, _>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::LengthMismatch {
                max: 48,
                actual: 49
            }
        ));
        assert_eq!(cs.num_constraints(), 49 * 8);
    }

    #[test]
    fn value_above_modulus_is_unsatisfiable() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let data = [0xffu8; 48];
        let bytes = alloc_private_bytes(cs.clone(), Some(&data), data.len()).unwrap();
        emulated_from_be_bytes::<curve::Fq, _>(&bytes).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
