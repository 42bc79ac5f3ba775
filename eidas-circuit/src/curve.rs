// eidas/eidas-circuit/src/curve.rs
// Numan Thabit 2025

//! NIST P-384 (secp384r1) as an arkworks short Weierstrass curve.
//!
//! The proving system works over the BN254 scalar field, so neither of these
//! fields is native. They only exist host-side for witness values, constants
//! and pre-circuit validation; inside the circuit they are emulated.

use ark_ec::{
    models::CurveConfig,
    short_weierstrass::{self as sw, SWCurveConfig},
    AffineRepr, CurveGroup,
};
use ark_ff::{
    fields::{Fp384, MontBackend, MontConfig},
    BigInteger, Field, MontFp, PrimeField,
};
use once_cell::sync::Lazy;

/// Byte width of a P-384 coordinate or scalar.
pub const P384_BYTES: usize = 48;
/// Bit width of a P-384 scalar; also the number of double-and-add rounds.
pub const SCALAR_BITS: usize = 384;

#[derive(MontConfig)]
#[modulus = "39402006196394479212279040100143613805079739270465446667948293404245721771496870329047266088258938001861606973112319"]
#[generator = "19"]
pub struct FqConfig;
/// Coordinate field, p = 2^384 - 2^128 - 2^96 + 2^32 - 1.
pub type Fq = Fp384<MontBackend<FqConfig, 6>>;

#[derive(MontConfig)]
#[modulus = "39402006196394479212279040100143613805079739270465446667946905279627659399113263569398956308152294913554433653942643"]
#[generator = "2"]
pub struct FrConfig;
/// Scalar field, the prime group order n.
pub type Fr = Fp384<MontBackend<FrConfig, 6>>;

pub type Affine = sw::Affine<Config>;
pub type Projective = sw::Projective<Config>;

#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct Config;

impl CurveConfig for Config {
    type BaseField = Fq;
    type ScalarField = Fr;

    /// COFACTOR = 1
    const COFACTOR: &'static [u64] = &[0x1];

    /// COFACTOR_INV = COFACTOR^{-1} mod n = 1
    const COFACTOR_INV: Fr = Fr::ONE;
}

impl SWCurveConfig for Config {
    /// COEFF_A = -3
    const COEFF_A: Fq = MontFp!("-3");

    /// COEFF_B =
    /// 0xb3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875ac656398d8a2ed19d2a85c8edd3ec2aef
    const COEFF_B: Fq = MontFp!("27580193559959705877849011840389048093056905856361568521428707301988689241309860865136260764883745107765439761230575");

    const GENERATOR: Affine = Affine::new_unchecked(G_GENERATOR_X, G_GENERATOR_Y);
}

/// 0xaa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b9859f741e082542a385502f25dbf55296c3a545e3872760ab7
pub const G_GENERATOR_X: Fq = MontFp!("26247035095799689268623156744566981891852923491109213387815615900925518854738050089022388053975719786650872476732087");

/// 0x3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147ce9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f
pub const G_GENERATOR_Y: Fq = MontFp!("8325710961489029985546751289520108179287853048861315594709205902480503199884419224438643760392947333078086511627871");

/// Seed for the accumulator offset used by the scalar multiplication gadget.
const OFFSET_SEED: u64 = 0x6549_4441_5320_4f46;

static DEFAULT_PARAMS: Lazy<P384Params> = Lazy::new(P384Params::derive);

/// Immutable curve configuration handed to every gadget that needs curve
/// constants.
///
/// `offset` seeds the double-and-add accumulator so that the incomplete affine
/// formulas never meet the point at infinity; `offset_correction` is
/// `-(2^SCALAR_BITS * offset)` and removes it again after the last round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct P384Params {
    pub generator: Affine,
    pub coeff_b: Fq,
    pub offset: Affine,
    pub offset_correction: Affine,
}

impl P384Params {
    fn derive() -> Self {
        let generator = Config::GENERATOR;
        let offset = (generator * Fr::from(OFFSET_SEED)).into_affine();
        let mut shifted = offset.into_group();
        for _ in 0..SCALAR_BITS {
            shifted = shifted + shifted;
        }
        Self {
            generator,
            coeff_b: Config::COEFF_B,
            offset,
            offset_correction: (-shifted).into_affine(),
        }
    }

    /// Shared parameter set. Derivation is deterministic, so every caller sees
    /// the same constants.
    pub fn p384() -> &'static Self {
        &DEFAULT_PARAMS
    }
}

/// Parse a 48-byte big-endian integer as a canonical element of `F`.
///
/// Returns `None` when the value is not below the modulus, so callers never
/// get a silently reduced value.
pub fn field_from_be_bytes<F: PrimeField>(bytes: &[u8]) -> Option<F> {
    if bytes.len() > P384_BYTES {
        return None;
    }
    let value = F::from_be_bytes_mod_order(bytes);
    let round_trip = field_to_be_bytes(&value);
    let offset = P384_BYTES - bytes.len();
    (round_trip[..offset].iter().all(|b| *b == 0) && round_trip[offset..] == *bytes)
        .then_some(value)
}

/// Fixed-width 48-byte big-endian encoding.
pub fn field_to_be_bytes<F: PrimeField>(value: &F) -> [u8; P384_BYTES] {
    let be = value.into_bigint().to_bytes_be();
    let mut out = [0u8; P384_BYTES];
    out[P384_BYTES - be.len()..].copy_from_slice(&be);
    out
}

/// Decode an uncompressed SEC1 point (`04 || X || Y`) and check it is on the
/// curve.
pub fn affine_from_sec1(bytes: &[u8]) -> Option<Affine> {
    if bytes.len() != 1 + 2 * P384_BYTES || bytes[0] != 0x04 {
        return None;
    }
    let x = field_from_be_bytes::<Fq>(&bytes[1..1 + P384_BYTES])?;
    let y = field_from_be_bytes::<Fq>(&bytes[1 + P384_BYTES..])?;
    let point = Affine::new_unchecked(x, y);
    (point.is_on_curve() && !point.is_zero()).then_some(point)
}

/// Encode a point as uncompressed SEC1.
pub fn affine_to_sec1(point: &Affine) -> Option<Vec<u8>> {
    let (x, y) = point.xy()?;
    let mut out = Vec::with_capacity(1 + 2 * P384_BYTES);
    out.push(0x04);
    out.extend_from_slice(&field_to_be_bytes(&x));
    out.extend_from_slice(&field_to_be_bytes(&y));
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::PrimeGroup;

    #[test]
    fn generator_is_on_curve() {
        assert!(Config::GENERATOR.is_on_curve());
        assert!(Config::GENERATOR.is_in_correct_subgroup_assuming_on_curve());
    }

    #[test]
    fn group_order_annihilates_generator() {
        let n_minus_one = -Fr::ONE;
        let almost = Projective::generator() * n_minus_one;
        assert_eq!((almost + Projective::generator()).into_affine(), Affine::zero());
    }

    #[test]
    fn offset_correction_cancels_shifted_offset() {
        let params = P384Params::p384();
        let mut shifted = params.offset.into_group();
        for _ in 0..SCALAR_BITS {
            shifted = shifted + shifted;
        }
        assert!((shifted + params.offset_correction).into_affine().is_zero());
    }

    #[test]
    fn field_bytes_reject_non_canonical() {
        let mut too_big = [0xffu8; P384_BYTES];
        assert!(field_from_be_bytes::<Fq>(&too_big).is_none());
        too_big[0] = 0x00;
        let value = field_from_be_bytes::<Fq>(&too_big).unwrap();
        assert_eq!(field_to_be_bytes(&value), too_big);
    }

    #[test]
    fn sec1_round_trip() {
        let encoded = affine_to_sec1(&Config::GENERATOR).unwrap();
        assert_eq!(encoded.len(), 97);
        assert_eq!(affine_from_sec1(&encoded), Some(Config::GENERATOR));

        let mut tampered = encoded.clone();
        tampered[96] ^= 1;
        assert!(affine_from_sec1(&tampered).is_none());
    }
}
