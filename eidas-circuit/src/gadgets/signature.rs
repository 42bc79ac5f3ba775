// eidas/eidas-circuit/src/gadgets/signature.rs
// Numan Thabit 2025

//! In-circuit encoding of an emulated ECDSA signature into the fixed
//! tag-length-value layout found inside the certificate.

use ark_ff::PrimeField;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

use crate::{
    curve::{self, P384_BYTES},
    profile::SignatureEncoding,
    ConstraintF, ScalarVar,
};

/// Signature scalars inside the circuit.
#[derive(Clone, Debug)]
pub struct SignatureVar {
    pub r: ScalarVar,
    pub s: ScalarVar,
}

impl SignatureVar {
    pub fn new_witness(
        cs: impl Into<ark_relations::r1cs::Namespace<ConstraintF>>,
        value: Option<(curve::Fr, curve::Fr)>,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let r = ScalarVar::new_witness(cs.clone(), || {
            value.map(|(r, _)| r).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let s = ScalarVar::new_witness(cs, || {
            value.map(|(_, s)| s).ok_or(SynthesisError::AssignmentMissing)
        })?;
        Ok(Self { r, s })
    }
}

/// Canonical big-endian bytes of an emulated scalar, 48 bytes wide.
pub fn scalar_to_be_bytes(
    scalar: &ScalarVar,
) -> Result<Vec<UInt8<ConstraintF>>, SynthesisError> {
    let mut bits = scalar.to_bits_le()?;
    bits.truncate(curve::Fr::MODULUS_BIT_SIZE as usize);
    bits.resize(8 * P384_BYTES, Boolean::FALSE);
    Ok(bits.chunks(8).rev().map(UInt8::from_bits_le).collect())
}

/// Emit `prefix || R || prefix || S` with R and S at fixed width.
///
/// R and S are always below the group order, so 48 bytes always suffice; the
/// `Padded` layout additionally assumes the certificate carried a `00` sign
/// byte, which the byte comparison against the certificate enforces.
pub fn encode_signature(
    signature: &SignatureVar,
    encoding: SignatureEncoding,
) -> Result<Vec<UInt8<ConstraintF>>, SynthesisError> {
    let prefix = UInt8::constant_vec(encoding.prefix());
    let mut out = Vec::with_capacity(encoding.encoded_len());
    out.extend_from_slice(&prefix);
    out.extend(scalar_to_be_bytes(&signature.r)?);
    out.extend_from_slice(&prefix);
    out.extend(scalar_to_be_bytes(&signature.s)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    fn scalar(byte: u8) -> curve::Fr {
        curve::Fr::from_be_bytes_mod_order(&[byte; 47])
    }

    #[test]
    fn padded_layout_matches_host_bytes() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let (r, s) = (scalar(0x81), scalar(0x42));
        let sig = SignatureVar::new_witness(cs.clone(), Some((r, s))).unwrap();
        let encoded = encode_signature(&sig, SignatureEncoding::Padded).unwrap();

        let mut expected = vec![0x02, 0x31, 0x00];
        expected.extend(curve::field_to_be_bytes(&r));
        expected.extend([0x02, 0x31, 0x00]);
        expected.extend(curve::field_to_be_bytes(&s));

        assert_eq!(encoded.len(), 102);
        assert_eq!(encoded.value().unwrap(), expected);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn compact_layout_width() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let sig = SignatureVar::new_witness(cs.clone(), Some((scalar(1), scalar(2)))).unwrap();
        let encoded = encode_signature(&sig, SignatureEncoding::Compact).unwrap();
        let value = encoded.value().unwrap();
        assert_eq!(value.len(), 100);
        assert_eq!(&value[..2], &[0x02, 0x30]);
        assert_eq!(&value[50..52], &[0x02, 0x30]);
        // 47 significant bytes, so one leading zero
        assert_eq!(value[2], 0x00);
    }
}
