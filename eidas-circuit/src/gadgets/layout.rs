// eidas/eidas-circuit/src/gadgets/layout.rs
// Numan Thabit 2025

//! Byte-range equality between a fixed-format container and a needle.
//!
//! This is the only link between the separately supplied witness fields
//! (subject, public key, signature) and the raw certificate buffers. Bytes
//! the profile fixes outright are pinned to constants.

use ark_ff::PrimeField;
use ark_r1cs_std::prelude::*;

use crate::{profile::ByteRange, CircuitError};

/// Enforce `container[range.offset + i] == needle[i]` for every `i`.
///
/// Shape checks run before any constraint is emitted: a needle whose width
/// differs from the slot, or a slot that overruns the container, is a profile
/// problem and never reaches the constraint system.
pub fn assert_subsequence<F: PrimeField>(
    field: &'static str,
    container: &[UInt8<F>],
    needle: &[UInt8<F>],
    range: ByteRange,
) -> Result<(), CircuitError> {
    check_slot(field, container.len(), needle.len(), range)?;
    let window = &container[range.offset..range.end()];
    for (have, want) in window.iter().zip(needle) {
        have.enforce_equal(want)?;
    }
    tracing::trace!(field, offset = range.offset, len = range.len, "pinned byte range");
    Ok(())
}

/// Host mirror of [`assert_subsequence`], used to pre-check witnesses.
pub fn subsequence_matches(
    field: &'static str,
    container: &[u8],
    needle: &[u8],
    range: ByteRange,
) -> Result<bool, CircuitError> {
    check_slot(field, container.len(), needle.len(), range)?;
    Ok(container[range.offset..range.end()] == *needle)
}

/// Enforce `container[positions[i]] == constants[i]` for every `i`.
pub fn assert_constant_bytes<F: PrimeField>(
    field: &'static str,
    container: &[UInt8<F>],
    positions: &[usize],
    constants: &[u8],
) -> Result<(), CircuitError> {
    check_positions(field, container.len(), positions, constants.len())?;
    for (&pos, &byte) in positions.iter().zip(constants) {
        container[pos].enforce_equal(&UInt8::constant(byte))?;
    }
    tracing::trace!(field, count = positions.len(), "pinned constant bytes");
    Ok(())
}

/// Host mirror of [`assert_constant_bytes`].
pub fn constant_bytes_match(
    field: &'static str,
    container: &[u8],
    positions: &[usize],
    constants: &[u8],
) -> Result<bool, CircuitError> {
    check_positions(field, container.len(), positions, constants.len())?;
    Ok(positions.iter().zip(constants).all(|(&pos, &byte)| container[pos] == byte))
}

fn check_positions(
    field: &'static str,
    container_len: usize,
    positions: &[usize],
    constants_len: usize,
) -> Result<(), CircuitError> {
    let overrun = positions.iter().copied().find(|&pos| pos >= container_len);
    if positions.len() != constants_len || overrun.is_some() {
        return Err(CircuitError::Layout {
            field,
            offset: overrun.unwrap_or(0),
            expected: positions.len(),
            actual: constants_len,
        });
    }
    Ok(())
}

fn check_slot(
    field: &'static str,
    container_len: usize,
    needle_len: usize,
    range: ByteRange,
) -> Result<(), CircuitError> {
    if needle_len != range.len || !range.fits_in(container_len) {
        return Err(CircuitError::Layout {
            field,
            offset: range.offset,
            expected: range.len,
            actual: needle_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gadgets::bytes::alloc_private_bytes, ConstraintF};
    use ark_relations::r1cs::ConstraintSystem;

    fn run(container: &[u8], needle: &[u8], range: ByteRange) -> Result<bool, CircuitError> {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let c = alloc_private_bytes(cs.clone(), Some(container), container.len())?;
        let n = alloc_private_bytes(cs.clone(), Some(needle), needle.len())?;
        assert_subsequence("test", &c, &n, range)?;
        Ok(cs.is_satisfied()?)
    }

    #[test]
    fn accepts_identical_range() {
        let container = b"xxPN:11223344yy";
        assert!(run(container, b"PN:11223344", ByteRange::new(2, 11)).unwrap());
        assert!(subsequence_matches("test", container, b"PN:11223344", ByteRange::new(2, 11)).unwrap());
    }

    #[test]
    fn rejects_single_byte_difference() {
        let container = b"xxPN:11223344yy";
        assert!(!run(container, b"PN:11223345", ByteRange::new(2, 11)).unwrap());
        assert!(!run(container, b"PN:11223344", ByteRange::new(3, 11)).unwrap_or(false));
    }

    #[test]
    fn wrong_needle_width_fails_before_constraints() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let c = alloc_private_bytes(cs.clone(), Some(&[0u8; 16]), 16).unwrap();
        let n = alloc_private_bytes(cs.clone(), Some(&[0u8; 10]), 10).unwrap();
        let before = cs.num_constraints();
        let err = assert_subsequence("subject", &c, &n, ByteRange::new(0, 11)).unwrap_err();
        assert!(matches!(err, CircuitError::Layout { field: "subject", expected: 11, actual: 10, .. }));
        assert_eq!(cs.num_constraints(), before);
    }

    #[test]
    fn constant_bytes_are_pinned() {
        let container = [0x30u8, 0x82, 0xaa, 0x03];
        let positions = [0, 1, 3];
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let c = alloc_private_bytes(cs.clone(), Some(&container[..]), container.len()).unwrap();
        assert_constant_bytes("envelope", &c, &positions, &[0x30, 0x82, 0x03]).unwrap();
        assert!(cs.is_satisfied().unwrap());
        assert!(constant_bytes_match("envelope", &container, &positions, &[0x30, 0x82, 0x03]).unwrap());

        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let c = alloc_private_bytes(cs.clone(), Some(&container[..]), container.len()).unwrap();
        assert_constant_bytes("envelope", &c, &positions, &[0x30, 0x81, 0x03]).unwrap();
        assert!(!cs.is_satisfied().unwrap());
        assert!(!constant_bytes_match("envelope", &container, &positions, &[0x30, 0x81, 0x03]).unwrap());
    }

    #[test]
    fn constant_position_past_container_is_rejected() {
        let err = constant_bytes_match("envelope", &[0u8; 4], &[1, 4], &[0, 0]).unwrap_err();
        assert!(matches!(err, CircuitError::Layout { field: "envelope", offset: 4, .. }));
    }

    #[test]
    fn overrunning_slot_is_rejected() {
        let err = subsequence_matches("pubkey", &[0u8; 8], &[0u8; 4], ByteRange::new(6, 4)).unwrap_err();
        assert!(matches!(err, CircuitError::Layout { field: "pubkey", .. }));
    }
}
