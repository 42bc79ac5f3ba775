// eidas/eidas-circuit/src/gadgets/point.rs
// Numan Thabit 2025

//! Affine P-384 points over emulated coordinates.
//!
//! `ProjectiveVar` in ark-r1cs-std requires the curve's base field to be the
//! native field, which P-384 over BN254 is not. The formulas here are the
//! incomplete affine ones; every division goes through an enforced inverse, so
//! an exceptional case makes the system unsatisfiable rather than unsound.

use ark_ec::AffineRepr;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

use crate::{
    curve::{Affine, Fq, P384Params, P384_BYTES},
    gadgets::limbs::emulated_from_be_bytes,
    CircuitError, ConstraintF, FqVar,
};

#[derive(Clone, Debug)]
pub struct AffinePointVar {
    pub x: FqVar,
    pub y: FqVar,
}

impl AffinePointVar {
    pub fn new(x: FqVar, y: FqVar) -> Self {
        Self { x, y }
    }

    /// Constant point. The identity has no affine form and is rejected.
    pub fn constant(point: &Affine) -> Result<Self, CircuitError> {
        let (x, y) = point.xy().ok_or(CircuitError::InvalidPoint("constant point"))?;
        Ok(Self::new(FqVar::constant(x), FqVar::constant(y)))
    }

    /// Parse an uncompressed SEC1 encoding (`04 || X || Y`) through the limb
    /// bridge.
    pub fn from_sec1_bytes(bytes: &[UInt8<ConstraintF>]) -> Result<Self, CircuitError> {
        if bytes.len() != 1 + 2 * P384_BYTES {
            return Err(CircuitError::LengthMismatch {
                max: 1 + 2 * P384_BYTES,
                actual: bytes.len(),
            });
        }
        bytes[0].enforce_equal(&UInt8::constant(0x04))?;
        let x = emulated_from_be_bytes(&bytes[1..1 + P384_BYTES])?;
        let y = emulated_from_be_bytes(&bytes[1 + P384_BYTES..])?;
        Ok(Self::new(x, y))
    }

    /// `y^2 = x^3 - 3x + b`
    pub fn enforce_on_curve(&self, params: &P384Params) -> Result<(), SynthesisError> {
        let x2 = self.x.square()?;
        let x3 = &x2 * &self.x;
        let rhs = x3 - self.x.double()? - &self.x + params.coeff_b;
        self.y.square()?.enforce_equal(&rhs)
    }

    /// `self + other` for points with distinct x coordinates.
    pub fn add_unequal(&self, other: &Self) -> Result<Self, SynthesisError> {
        let dx = &other.x - &self.x;
        let dy = &other.y - &self.y;
        let lambda = dy * dx.inverse()?;
        let x3 = lambda.square()? - &self.x - &other.x;
        let y3 = &lambda * (&self.x - &x3) - &self.y;
        Ok(Self::new(x3, y3))
    }

    /// `2 * self`, with `a = -3`.
    pub fn double(&self) -> Result<Self, SynthesisError> {
        let x2 = self.x.square()?;
        let numerator = x2.double()? + &x2 - Fq::from(3u64);
        let lambda = numerator * self.y.double()?.inverse()?;
        let x3 = lambda.square()? - self.x.double()?;
        let y3 = &lambda * (&self.x - &x3) - &self.y;
        Ok(Self::new(x3, y3))
    }

    pub fn negate(&self) -> Result<Self, SynthesisError> {
        Ok(Self::new(self.x.clone(), self.y.negate()?))
    }

    pub fn value(&self) -> Result<Affine, SynthesisError> {
        Ok(Affine::new_unchecked(self.x.value()?, self.y.value()?))
    }
}

impl CondSelectGadget<ConstraintF> for AffinePointVar {
    fn conditionally_select(
        cond: &Boolean<ConstraintF>,
        true_value: &Self,
        false_value: &Self,
    ) -> Result<Self, SynthesisError> {
        Ok(Self::new(
            cond.select(&true_value.x, &false_value.x)?,
            cond.select(&true_value.y, &false_value.y)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Config, Fr};
    use ark_ec::{short_weierstrass::SWCurveConfig, CurveGroup};
    use ark_relations::r1cs::ConstraintSystem;

    fn witness(cs: &ark_relations::r1cs::ConstraintSystemRef<ConstraintF>, p: &Affine) -> AffinePointVar {
        let (x, y) = p.xy().unwrap();
        AffinePointVar::new(
            FqVar::new_witness(cs.clone(), || Ok(x)).unwrap(),
            FqVar::new_witness(cs.clone(), || Ok(y)).unwrap(),
        )
    }

    #[test]
    fn add_and_double_match_host_arithmetic() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let g = Config::GENERATOR;
        let p = (g * Fr::from(7u64)).into_affine();

        let gv = witness(&cs, &g);
        let pv = witness(&cs, &p);

        let sum = gv.add_unequal(&pv).unwrap();
        assert_eq!(sum.value().unwrap(), (g + p).into_affine());

        let dbl = pv.double().unwrap();
        assert_eq!(dbl.value().unwrap(), (p + p).into_affine());

        dbl.enforce_on_curve(P384Params::p384()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn adding_equal_x_is_unsatisfiable() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let g = Config::GENERATOR;
        let gv = witness(&cs, &g);
        let neg = gv.negate().unwrap();
        gv.add_unequal(&neg).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn off_curve_point_is_unsatisfiable() {
        let cs = ConstraintSystem::<ConstraintF>::new_ref();
        let (x, y) = Config::GENERATOR.xy().unwrap();
        let bad = AffinePointVar::new(
            FqVar::new_witness(cs.clone(), || Ok(x)).unwrap(),
            FqVar::new_witness(cs.clone(), || Ok(y + Fq::from(1u64))).unwrap(),
        );
        bad.enforce_on_curve(P384Params::p384()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn identity_has_no_constant_form() {
        assert!(AffinePointVar::constant(&Affine::zero()).is_err());
    }
}
