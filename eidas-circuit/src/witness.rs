// eidas/eidas-circuit/src/witness.rs
// Numan Thabit 2025

use serde::{Deserialize, Serialize};

use crate::{
    curve::{self, P384_BYTES},
    CircuitError,
};

/// ECDSA signature as two fixed-width big-endian P-384 scalars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaSignature {
    #[serde(with = "hex_array")]
    pub r: [u8; P384_BYTES],
    #[serde(with = "hex_array")]
    pub s: [u8; P384_BYTES],
}

impl EcdsaSignature {
    pub fn from_scalars(r: &curve::Fr, s: &curve::Fr) -> Self {
        Self {
            r: curve::field_to_be_bytes(r),
            s: curve::field_to_be_bytes(s),
        }
    }

    /// Both scalars as canonical, non-zero elements of the group order field.
    pub fn scalars(&self) -> Result<(curve::Fr, curve::Fr), CircuitError> {
        let r = curve::field_from_be_bytes::<curve::Fr>(&self.r)
            .filter(|v| *v != curve::Fr::from(0u64))
            .ok_or(CircuitError::InvalidScalar("signature r"))?;
        let s = curve::field_from_be_bytes::<curve::Fr>(&self.s)
            .filter(|v| *v != curve::Fr::from(0u64))
            .ok_or(CircuitError::InvalidScalar("signature s"))?;
        Ok((r, s))
    }
}

pub(crate) fn check_len(field: &'static str, bytes: &[u8], expected: usize) -> Result<(), CircuitError> {
    if bytes.len() != expected {
        return Err(CircuitError::WitnessLength {
            field,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Hex (de)serialization for fixed-size byte arrays wider than serde's
/// built-in array support.
pub mod hex_array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(text.trim_start_matches("0x")).map_err(D::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected {N} bytes, got {len}")))
    }
}

/// Hex (de)serialization for variable-length buffers.
pub mod hex_vec {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim_start_matches("0x")).map_err(D::Error::custom)
    }
}
