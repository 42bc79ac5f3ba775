// eidas/eidas-common/src/solidity.rs
// Numan Thabit 2025

//! Proof tuple in the shape the on-chain Groth16 verifier takes.
//!
//! Every coordinate is a decimal integer below the BN254 base field modulus.
//! G2 coordinates are ordered `[c1, c0]`, the order the EVM pairing
//! precompile reads them in.

use anyhow::{anyhow, ensure, Result};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{PrimeField, Zero};
use ark_groth16::Proof;
use serde::{Deserialize, Serialize};

use crate::{fr_from_decimal, fr_to_decimal};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidityProof {
    #[serde(rename = "A")]
    pub a: [String; 2],
    #[serde(rename = "B")]
    pub b: [[String; 2]; 2],
    #[serde(rename = "C")]
    pub c: [String; 2],
}

/// Proof tuple plus the public-input array, i.e. the full argument list of
/// `verifyProof(a, b, c, input)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidityCall {
    #[serde(flatten)]
    pub proof: SolidityProof,
    #[serde(rename = "Input")]
    pub input: Vec<String>,
}

impl SolidityCall {
    pub fn new(proof: &Proof<Bn254>, public_inputs: &[Fr]) -> Self {
        Self {
            proof: SolidityProof::from_proof(proof),
            input: public_inputs.iter().map(fr_to_decimal).collect(),
        }
    }

    /// Input integers as field elements. Values at or above the scalar
    /// modulus are an error, as in the contract.
    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        self.input.iter().map(|v| fr_from_decimal(v)).collect()
    }
}

impl SolidityProof {
    pub fn from_proof(proof: &Proof<Bn254>) -> Self {
        let (ax, ay) = g1_coords(&proof.a);
        let (bx, by) = g2_coords(&proof.b);
        let (cx, cy) = g1_coords(&proof.c);
        Self {
            a: [fq_to_decimal(&ax), fq_to_decimal(&ay)],
            b: [
                [fq_to_decimal(&bx.c1), fq_to_decimal(&bx.c0)],
                [fq_to_decimal(&by.c1), fq_to_decimal(&by.c0)],
            ],
            c: [fq_to_decimal(&cx), fq_to_decimal(&cy)],
        }
    }

    /// Rebuild the arkworks proof, rejecting coordinates that are not
    /// canonical or points that are off-curve or outside the prime subgroup.
    pub fn to_proof(&self) -> Result<Proof<Bn254>> {
        let a = g1_point(&self.a, "A")?;
        let b = g2_point(&self.b)?;
        let c = g1_point(&self.c, "C")?;
        Ok(Proof { a, b, c })
    }
}

fn fq_to_decimal(value: &Fq) -> String {
    value.into_bigint().to_string()
}

fn fq_from_decimal(text: &str) -> Result<Fq> {
    let bigint: <Fq as PrimeField>::BigInt = text
        .parse()
        .map_err(|_| anyhow!("invalid decimal coordinate {text:?}"))?;
    Fq::from_bigint(bigint).ok_or_else(|| anyhow!("coordinate {text} is not below the base field modulus"))
}

// the EVM encodes the point at infinity as (0, 0)
fn g1_coords(point: &G1Affine) -> (Fq, Fq) {
    point.xy().unwrap_or((Fq::zero(), Fq::zero()))
}

fn g2_coords(point: &G2Affine) -> (Fq2, Fq2) {
    point.xy().unwrap_or((Fq2::zero(), Fq2::zero()))
}

fn g1_point(coords: &[String; 2], label: &str) -> Result<G1Affine> {
    let x = fq_from_decimal(&coords[0])?;
    let y = fq_from_decimal(&coords[1])?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::identity());
    }
    let point = G1Affine::new_unchecked(x, y);
    ensure!(
        point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve(),
        "proof point {label} is not a valid G1 element"
    );
    Ok(point)
}

fn g2_point(coords: &[[String; 2]; 2]) -> Result<G2Affine> {
    let x = Fq2::new(fq_from_decimal(&coords[0][1])?, fq_from_decimal(&coords[0][0])?);
    let y = Fq2::new(fq_from_decimal(&coords[1][1])?, fq_from_decimal(&coords[1][0])?);
    if x.is_zero() && y.is_zero() {
        return Ok(G2Affine::identity());
    }
    let point = G2Affine::new_unchecked(x, y);
    ensure!(
        point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve(),
        "proof point B is not a valid G2 element"
    );
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::{CurveGroup, PrimeGroup};
    use ark_bn254::{G1Projective, G2Projective};

    fn sample_proof() -> Proof<Bn254> {
        Proof {
            a: (G1Projective::generator() * Fr::from(3u64)).into_affine(),
            b: (G2Projective::generator() * Fr::from(5u64)).into_affine(),
            c: (G1Projective::generator() * Fr::from(7u64)).into_affine(),
        }
    }

    #[test]
    fn tuple_rebuilds_the_same_proof() {
        let proof = sample_proof();
        let tuple = SolidityProof::from_proof(&proof);
        assert_eq!(tuple.to_proof().unwrap(), proof);
    }

    #[test]
    fn g2_coordinates_are_swapped() {
        let proof = sample_proof();
        let tuple = SolidityProof::from_proof(&proof);
        let (x, _) = proof.b.xy().unwrap();
        assert_eq!(tuple.b[0][0], fq_to_decimal(&x.c1));
        assert_eq!(tuple.b[0][1], fq_to_decimal(&x.c0));
    }

    #[test]
    fn off_curve_point_is_rejected() {
        let mut tuple = SolidityProof::from_proof(&sample_proof());
        tuple.a[1] = "1".into();
        assert!(tuple.to_proof().is_err());
    }

    #[test]
    fn call_serializes_with_contract_field_names() {
        let call = SolidityCall::new(&sample_proof(), &[Fr::from(48u64)]);
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("A").is_some());
        assert!(json.get("B").is_some());
        assert_eq!(json["Input"][0], "48");
        let back: SolidityCall = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
    }
}
