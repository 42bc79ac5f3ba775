// eidas/eidas-circuit/src/gadgets/ecdsa.rs
// Numan Thabit 2025

use ark_ff::PrimeField;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::SynthesisError;

use crate::{
    curve::{self, P384Params, SCALAR_BITS},
    gadgets::{point::AffinePointVar, signature::SignatureVar},
    CircuitError, ConstraintF, FqVar, ScalarVar,
};

/// Width of the chunks used to compare `R.x` against `r`.
const COMPARE_CHUNK_BITS: usize = 64;

/// Enforce that `signature` is a valid ECDSA signature of `message` under
/// `public_key` on P-384.
///
/// `message` is the integer form of the signed bytes (a digest, or the raw
/// challenge for card-produced signatures over short messages). `s` must be
/// invertible, `u1 = z / s`, `u2 = r / s`, and `(u1 * G + u2 * Q).x` must equal
/// `r` as an integer. The public key is constrained to lie on the curve.
///
/// Both scalar multiplications share one double-and-add pass (Shamir's
/// trick). The accumulator starts at `params.offset` and is corrected at the
/// end, which keeps it away from the identity.
pub fn verify_ecdsa(
    params: &P384Params,
    public_key: &AffinePointVar,
    message: &ScalarVar,
    signature: &SignatureVar,
) -> Result<(), CircuitError> {
    public_key.enforce_on_curve(params)?;

    let s_inv = signature.s.inverse()?;
    let u1 = message * &s_inv;
    let u2 = &signature.r * &s_inv;
    let u1_bits = canonical_bits(&u1)?;
    let u2_bits = canonical_bits(&u2)?;

    let generator = AffinePointVar::constant(&params.generator)?;
    let generator_plus_key = generator.add_unequal(public_key)?;

    let mut acc = AffinePointVar::constant(&params.offset)?;
    for i in (0..SCALAR_BITS).rev() {
        acc = acc.double()?;
        let (b1, b2) = (&u1_bits[i], &u2_bits[i]);
        // the (0, 0) case picks G but the sum is discarded below
        let when_b1 = b2.select(&generator_plus_key, &generator)?;
        let when_not_b1 = b2.select(public_key, &generator)?;
        let addend = b1.select(&when_b1, &when_not_b1)?;
        let sum = acc.add_unequal(&addend)?;
        acc = (b1 | b2).select(&sum, &acc)?;
    }
    let point = acc.add_unequal(&AffinePointVar::constant(&params.offset_correction)?)?;

    enforce_x_matches_r(&point.x, &signature.r)?;
    Ok(())
}

fn canonical_bits(scalar: &ScalarVar) -> Result<Vec<Boolean<ConstraintF>>, SynthesisError> {
    let mut bits = scalar.to_bits_le()?;
    bits.truncate(curve::Fr::MODULUS_BIT_SIZE as usize);
    bits.resize(SCALAR_BITS, Boolean::FALSE);
    Ok(bits)
}

/// Compare the coordinate and the scalar as integers.
///
/// ECDSA reduces `R.x` mod n first; `R.x >= n` happens with probability about
/// 2^-194 for P-384 and is treated as a verification failure.
fn enforce_x_matches_r(x: &FqVar, r: &ScalarVar) -> Result<(), SynthesisError> {
    let mut x_bits = x.to_bits_le()?;
    x_bits.truncate(curve::Fq::MODULUS_BIT_SIZE as usize);
    let r_bits = canonical_bits(r)?;
    for (x_chunk, r_chunk) in x_bits
        .chunks(COMPARE_CHUNK_BITS)
        .zip(r_bits.chunks(COMPARE_CHUNK_BITS))
    {
        let lhs: FpVar<ConstraintF> = Boolean::le_bits_to_fp(x_chunk)?;
        lhs.enforce_equal(&Boolean::le_bits_to_fp(r_chunk)?)?;
    }
    Ok(())
}
