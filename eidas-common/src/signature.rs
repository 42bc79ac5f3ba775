// eidas/eidas-common/src/signature.rs
// Numan Thabit 2025

//! Host half of the signature codec.
//!
//! Cards return DER `SEQUENCE { INTEGER r, INTEGER s }`, certificates embed
//! the same structure, and the circuit works on fixed 48-byte scalars. These
//! helpers move between the three without ever reducing a value silently.

use eidas_circuit::{
    binding::encode_signature_bytes, curve::P384_BYTES, EcdsaSignature, SignatureEncoding,
};
use p384::ecdsa::{
    signature::hazmat::{PrehashSigner, PrehashVerifier},
    Signature, SigningKey, VerifyingKey,
};

use crate::CodecError;

/// Layout whose fixed-width bytes coincide with the DER encoding of `r` and
/// `s`, if any.
pub fn encoding_for(signature: &EcdsaSignature) -> Option<SignatureEncoding> {
    let padded = |v: &[u8; P384_BYTES]| v[0] & 0x80 != 0;
    // a 48-byte DER INTEGER: top bit clear and not a redundant leading zero
    let compact = |v: &[u8; P384_BYTES]| v[0] & 0x80 == 0 && (v[0] != 0 || v[1] & 0x80 != 0);
    if padded(&signature.r) && padded(&signature.s) {
        Some(SignatureEncoding::Padded)
    } else if compact(&signature.r) && compact(&signature.s) {
        Some(SignatureEncoding::Compact)
    } else {
        None
    }
}

/// Fixed-width encoding as it appears inside a certificate.
///
/// Fails when the scalars would be encoded differently by DER, since the
/// resulting bytes could then never match a real certificate.
pub fn encode_signature(
    signature: &EcdsaSignature,
    encoding: SignatureEncoding,
) -> Result<Vec<u8>, CodecError> {
    if encoding_for(signature) != Some(encoding) {
        return Err(CodecError::EncodingMismatch(encoding));
    }
    Ok(encode_signature_bytes(signature, encoding))
}

/// Inverse of [`encode_signature`].
pub fn decode_signature(
    bytes: &[u8],
    encoding: SignatureEncoding,
) -> Result<EcdsaSignature, CodecError> {
    let expected = encoding.encoded_len();
    if bytes.len() != expected {
        return Err(CodecError::SignatureLength {
            expected,
            actual: bytes.len(),
        });
    }
    let prefix = encoding.prefix();
    let half = prefix.len() + P384_BYTES;
    for start in [0, half] {
        if &bytes[start..start + prefix.len()] != prefix {
            return Err(CodecError::SignaturePrefix(start));
        }
    }
    let mut r = [0u8; P384_BYTES];
    let mut s = [0u8; P384_BYTES];
    r.copy_from_slice(&bytes[prefix.len()..half]);
    s.copy_from_slice(&bytes[half + prefix.len()..]);
    let signature = EcdsaSignature { r, s };
    if encoding_for(&signature) != Some(encoding) {
        return Err(CodecError::EncodingMismatch(encoding));
    }
    Ok(signature)
}

/// Parse a DER signature into fixed-width scalars. Both scalars must be
/// non-zero and below the group order.
pub fn unmarshal_asn1_signature(der: &[u8]) -> Result<EcdsaSignature, CodecError> {
    let signature = Signature::from_der(der).map_err(|_| CodecError::Asn1Signature)?;
    let (r, s) = signature.split_bytes();
    let mut out = EcdsaSignature {
        r: [0; P384_BYTES],
        s: [0; P384_BYTES],
    };
    out.r.copy_from_slice(&r);
    out.s.copy_from_slice(&s);
    Ok(out)
}

pub fn marshal_asn1_signature(signature: &EcdsaSignature) -> Result<Vec<u8>, CodecError> {
    Ok(to_p384(signature)?.to_der().as_bytes().to_vec())
}

/// Left-pad a message to scalar width.
///
/// The resulting integer is the big-endian value of `message`, which is
/// exactly what the circuit derives from the same bytes.
pub fn message_prehash(message: &[u8]) -> Result<[u8; P384_BYTES], CodecError> {
    if message.len() > P384_BYTES {
        return Err(CodecError::MessageTooLong(message.len()));
    }
    let mut out = [0u8; P384_BYTES];
    out[P384_BYTES - message.len()..].copy_from_slice(message);
    Ok(out)
}

/// Sign `message` the way the circuit verifies it, returning DER.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> Result<Vec<u8>, CodecError> {
    let prehash = message_prehash(message)?;
    let signature: Signature = key
        .sign_prehash(&prehash)
        .map_err(|_| CodecError::Verification)?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Host check of a signature over `message` under an uncompressed SEC1 key.
pub fn verify_message(
    public_key: &[u8],
    message: &[u8],
    signature: &EcdsaSignature,
) -> Result<(), CodecError> {
    let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| CodecError::PublicKey)?;
    let prehash = message_prehash(message)?;
    key.verify_prehash(&prehash, &to_p384(signature)?)
        .map_err(|_| CodecError::Verification)
}

/// Uncompressed SEC1 encoding of a verifying key.
pub fn public_key_sec1(key: &VerifyingKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

fn to_p384(signature: &EcdsaSignature) -> Result<Signature, CodecError> {
    Signature::from_scalars(
        p384::FieldBytes::clone_from_slice(&signature.r),
        p384::FieldBytes::clone_from_slice(&signature.s),
    )
    .map_err(|_| CodecError::Asn1Signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn key() -> SigningKey {
        SigningKey::random(&mut ChaCha20Rng::seed_from_u64(7))
    }

    fn scalar(first: u8) -> [u8; P384_BYTES] {
        let mut out = [0x11; P384_BYTES];
        out[0] = first;
        out
    }

    #[test]
    fn fixed_width_codec_round_trips() {
        let padded = EcdsaSignature { r: scalar(0x81), s: scalar(0xf0) };
        let bytes = encode_signature(&padded, SignatureEncoding::Padded).unwrap();
        assert_eq!(bytes.len(), 102);
        assert_eq!(decode_signature(&bytes, SignatureEncoding::Padded).unwrap(), padded);

        let compact = EcdsaSignature { r: scalar(0x01), s: scalar(0x7f) };
        let bytes = encode_signature(&compact, SignatureEncoding::Compact).unwrap();
        assert_eq!(bytes.len(), 100);
        assert_eq!(decode_signature(&bytes, SignatureEncoding::Compact).unwrap(), compact);
    }

    #[test]
    fn mixed_high_bits_fit_no_layout() {
        let mixed = EcdsaSignature { r: scalar(0x81), s: scalar(0x01) };
        assert_eq!(encoding_for(&mixed), None);
        assert!(encode_signature(&mixed, SignatureEncoding::Padded).is_err());
        assert!(encode_signature(&mixed, SignatureEncoding::Compact).is_err());
    }

    #[test]
    fn decode_rejects_bad_prefix_and_length() {
        let sig = EcdsaSignature { r: scalar(0x81), s: scalar(0x82) };
        let mut bytes = encode_signature(&sig, SignatureEncoding::Padded).unwrap();
        assert!(matches!(
            decode_signature(&bytes[1..], SignatureEncoding::Padded),
            Err(CodecError::SignatureLength { expected: 102, actual: 101 })
        ));
        bytes[51] = 0x03;
        assert!(matches!(
            decode_signature(&bytes, SignatureEncoding::Padded),
            Err(CodecError::SignaturePrefix(51))
        ));
    }

    #[test]
    fn der_signature_round_trips_through_fixed_scalars() {
        let der = sign_message(&key(), b"0123456789abcdef").unwrap();
        let sig = unmarshal_asn1_signature(&der).unwrap();
        assert_eq!(marshal_asn1_signature(&sig).unwrap(), der);
    }

    #[test]
    fn short_messages_verify_as_integers() {
        let key = key();
        let public = public_key_sec1(key.verifying_key());
        assert_eq!(public.len(), 97);
        let der = sign_message(&key, b"0123456789abcdef").unwrap();
        let sig = unmarshal_asn1_signature(&der).unwrap();
        verify_message(&public, b"0123456789abcdef", &sig).unwrap();
        // same integer, different byte string
        let mut padded = vec![0u8; 4];
        padded.extend_from_slice(b"0123456789abcdef");
        verify_message(&public, &padded, &sig).unwrap();
        assert!(verify_message(&public, b"0123456789abcdeg", &sig).is_err());
    }

    #[test]
    fn rejects_oversized_message_and_garbage_der() {
        assert!(matches!(message_prehash(&[0; 49]), Err(CodecError::MessageTooLong(49))));
        assert!(unmarshal_asn1_signature(&[0x30, 0x02, 0x02, 0x00]).is_err());
    }
}
