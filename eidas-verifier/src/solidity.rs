// eidas/eidas-verifier/src/solidity.rs
// Numan Thabit 2025

//! Renders a self-contained Groth16 verifier contract for a verifying key.
//!
//! The contract uses the BN254 precompiles (0x06 add, 0x07 mul, 0x08
//! pairing) and exposes `verifyProof(a, b, c, input)` with a fixed input
//! arity taken from the key.

use std::fmt::Write;

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{PrimeField, Zero};
use ark_groth16::VerifyingKey;

const CONTRACT_NAME: &str = "EidasVerifier";

pub fn export_solidity_verifier(vk: &VerifyingKey<Bn254>) -> String {
    let inputs = vk.gamma_abc_g1.len().saturating_sub(1);
    let mut constants = String::new();
    push_g1(&mut constants, "ALPHA", &vk.alpha_g1);
    push_g2(&mut constants, "BETA", &vk.beta_g2);
    push_g2(&mut constants, "GAMMA", &vk.gamma_g2);
    push_g2(&mut constants, "DELTA", &vk.delta_g2);
    for (i, point) in vk.gamma_abc_g1.iter().enumerate() {
        push_g1(&mut constants, &format!("IC{i}"), point);
    }

    let mut accumulate = String::new();
    for i in 1..=inputs {
        let _ = writeln!(
            accumulate,
            "        vkX = ecAdd(vkX, ecMul([IC{i}_X, IC{i}_Y], input[{}]));",
            i - 1
        );
    }

    format!(
        r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

/// Groth16 verifier over BN254, generated from the eIDAS binding verifying key.
contract {CONTRACT_NAME} {{
    uint256 constant SNARK_SCALAR_FIELD = {scalar_field};
    uint256 constant PRIME_Q = {base_field};

{constants}
    function verifyProof(
        uint256[2] calldata a,
        uint256[2][2] calldata b,
        uint256[2] calldata c,
        uint256[{inputs}] calldata input
    ) public view returns (bool) {{
        for (uint256 i = 0; i < {inputs}; i++) {{
            if (input[i] >= SNARK_SCALAR_FIELD) {{
                return false;
            }}
        }}
        if (a[0] >= PRIME_Q || a[1] >= PRIME_Q || c[0] >= PRIME_Q || c[1] >= PRIME_Q) {{
            return false;
        }}

        uint256[2] memory vkX = [IC0_X, IC0_Y];
{accumulate}
        uint256[2] memory negA = negate([a[0], a[1]]);
        uint256[24] memory pairing = [
            negA[0], negA[1], b[0][0], b[0][1], b[1][0], b[1][1],
            ALPHA_X, ALPHA_Y, BETA_X1, BETA_X0, BETA_Y1, BETA_Y0,
            vkX[0], vkX[1], GAMMA_X1, GAMMA_X0, GAMMA_Y1, GAMMA_Y0,
            c[0], c[1], DELTA_X1, DELTA_X0, DELTA_Y1, DELTA_Y0
        ];
        uint256[1] memory out;
        bool ok;
        assembly {{
            ok := staticcall(gas(), 0x08, pairing, 0x300, out, 0x20)
        }}
        return ok && out[0] == 1;
    }}

    function ecAdd(uint256[2] memory p, uint256[2] memory q) internal view returns (uint256[2] memory r) {{
        uint256[4] memory args = [p[0], p[1], q[0], q[1]];
        bool ok;
        assembly {{
            ok := staticcall(gas(), 0x06, args, 0x80, r, 0x40)
        }}
        require(ok, "ecAdd failed");
    }}

    function ecMul(uint256[2] memory p, uint256 s) internal view returns (uint256[2] memory r) {{
        uint256[3] memory args = [p[0], p[1], s];
        bool ok;
        assembly {{
            ok := staticcall(gas(), 0x07, args, 0x60, r, 0x40)
        }}
        require(ok, "ecMul failed");
    }}

    function negate(uint256[2] memory p) internal pure returns (uint256[2] memory) {{
        if (p[0] == 0 && p[1] == 0) {{
            return p;
        }}
        return [p[0], PRIME_Q - (p[1] % PRIME_Q)];
    }}
}}
"#,
        scalar_field = ark_bn254::Fr::MODULUS,
        base_field = Fq::MODULUS,
    )
}

fn decimal(value: &Fq) -> String {
    value.into_bigint().to_string()
}

fn push_g1(out: &mut String, name: &str, point: &G1Affine) {
    let (x, y) = point.xy().unwrap_or((Fq::zero(), Fq::zero()));
    let _ = writeln!(out, "    uint256 constant {name}_X = {};", decimal(&x));
    let _ = writeln!(out, "    uint256 constant {name}_Y = {};", decimal(&y));
}

// precompile order: imaginary part first
fn push_g2(out: &mut String, name: &str, point: &G2Affine) {
    let (x, y) = point.xy().unwrap_or((Fq2::zero(), Fq2::zero()));
    let _ = writeln!(out, "    uint256 constant {name}_X1 = {};", decimal(&x.c1));
    let _ = writeln!(out, "    uint256 constant {name}_X0 = {};", decimal(&x.c0));
    let _ = writeln!(out, "    uint256 constant {name}_Y1 = {};", decimal(&y.c1));
    let _ = writeln!(out, "    uint256 constant {name}_Y0 = {};", decimal(&y.c0));
}
