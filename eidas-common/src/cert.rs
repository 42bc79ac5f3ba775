// eidas/eidas-common/src/cert.rs
// Numan Thabit 2025

//! Certificate parser collaborator.
//!
//! The circuit never parses ASN.1. This module extracts the witness buffers
//! from a DER certificate and derives the byte offsets the circuit pins, so a
//! profile is measured from a real certificate instead of typed in by hand.

use eidas_circuit::{
    profile::{PUBKEY_LEN, SUBJECT_LEN},
    ByteRange, CertificateProfile, EcdsaSignature,
};
use x509_cert::{
    der::{Decode, Encode},
    spki::ObjectIdentifier,
    Certificate,
};

use crate::{
    signature::{encode_signature, encoding_for, unmarshal_asn1_signature},
    CodecError,
};

/// ecdsa-with-SHA256, the only certificate signature the circuit can check.
pub const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

#[derive(Clone, Debug)]
pub struct ParsedCertificate {
    certificate: Certificate,
    der: Vec<u8>,
    tbs: Vec<u8>,
}

/// Parse a DER certificate. Trailing bytes are rejected by the decoder.
pub fn unmarshal(der: &[u8]) -> Result<ParsedCertificate, CodecError> {
    let certificate = Certificate::from_der(der)?;
    let tbs = certificate.tbs_certificate.to_der()?;
    Ok(ParsedCertificate {
        certificate,
        der: der.to_vec(),
        tbs,
    })
}

/// Re-encode a parsed certificate.
pub fn marshal(parsed: &ParsedCertificate) -> Result<Vec<u8>, CodecError> {
    Ok(parsed.certificate.to_der()?)
}

impl ParsedCertificate {
    /// Bytes the certificate was parsed from.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// DER of the to-be-signed body, the input of the issuer's digest.
    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Reject certificates whose re-encoding differs from the input. The
    /// circuit hashes the raw TBS bytes, so a lossy parse would desynchronize
    /// the witness buffers from the signed document.
    pub fn ensure_round_trip(&self) -> Result<(), CodecError> {
        if marshal(self)? != self.der {
            return Err(CodecError::RoundTrip);
        }
        Ok(())
    }

    pub fn ensure_supported_algorithm(&self) -> Result<(), CodecError> {
        let oid = self.certificate.signature_algorithm.oid;
        if oid != ECDSA_WITH_SHA256 {
            return Err(CodecError::UnsupportedAlgorithm(oid.to_string()));
        }
        Ok(())
    }

    /// Uncompressed SEC1 subject key, as stored in the SPKI bit string.
    pub fn subject_pubkey(&self) -> Result<Vec<u8>, CodecError> {
        let bits = &self
            .certificate
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key;
        let bytes = bits.as_bytes().ok_or(CodecError::PublicKey)?;
        if bytes.len() != PUBKEY_LEN || bytes[0] != 0x04 {
            return Err(CodecError::PublicKey);
        }
        Ok(bytes.to_vec())
    }

    /// DER signature value carried in the certificate's outer bit string.
    pub fn signature_der(&self) -> Result<&[u8], CodecError> {
        self.certificate
            .signature
            .as_bytes()
            .ok_or(CodecError::Asn1Signature)
    }

    pub fn signature(&self) -> Result<EcdsaSignature, CodecError> {
        unmarshal_asn1_signature(self.signature_der()?)
    }

    /// Whether issuer and subject names are identical.
    pub fn is_self_issued(&self) -> bool {
        let tbs = &self.certificate.tbs_certificate;
        tbs.issuer == tbs.subject
    }
}

/// Measure the circuit profile from a sample certificate.
///
/// `subject` must appear exactly once in the TBS body; the subject key and the
/// fixed-width signature are located the same way. The result is validated
/// before it is returned.
pub fn profile_from_certificate(
    der: &[u8],
    subject: &[u8],
) -> Result<CertificateProfile, CodecError> {
    if subject.len() != SUBJECT_LEN {
        return Err(CodecError::Circuit(eidas_circuit::CircuitError::Layout {
            field: "subject",
            offset: 0,
            expected: SUBJECT_LEN,
            actual: subject.len(),
        }));
    }
    let parsed = unmarshal(der)?;
    parsed.ensure_round_trip()?;
    parsed.ensure_supported_algorithm()?;

    let tbs = parsed.tbs();
    let pubkey = parsed.subject_pubkey()?;
    let signature = parsed.signature()?;
    let encoding = encoding_for(&signature).ok_or(CodecError::Asn1Signature)?;
    let encoded = encode_signature(&signature, encoding)?;

    let mut profile = CertificateProfile {
        tbs_len: tbs.len(),
        cert_len: der.len(),
        tbs: ByteRange::new(find_unique(der, tbs, "tbs")?, tbs.len()),
        subject: ByteRange::new(find_unique(tbs, subject, "subject")?, SUBJECT_LEN),
        subject_pubkey: ByteRange::new(find_unique(tbs, &pubkey, "subject pubkey")?, PUBKEY_LEN),
        signature: ByteRange::new(find_unique(der, &encoded, "signature")?, encoded.len()),
        signature_encoding: encoding,
        envelope: Vec::new(),
    };
    profile.envelope = profile.envelope_of(der).ok_or(CodecError::NotFound("envelope"))?;
    profile.validate()?;
    tracing::debug!(?profile, "measured certificate profile");
    Ok(profile)
}

fn find_unique(haystack: &[u8], needle: &[u8], field: &'static str) -> Result<usize, CodecError> {
    let mut hits = haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| offset);
    let first = hits.next().ok_or(CodecError::NotFound(field))?;
    if hits.next().is_some() {
        return Err(CodecError::Ambiguous(field));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_single_occurrence() {
        assert_eq!(find_unique(b"xxabcxx", b"abc", "subject").unwrap(), 2);
        assert!(matches!(
            find_unique(b"abcabc", b"abc", "subject"),
            Err(CodecError::Ambiguous("subject"))
        ));
        assert!(matches!(
            find_unique(b"xyz", b"abc", "subject"),
            Err(CodecError::NotFound("subject"))
        ));
    }

    #[test]
    fn garbage_is_not_a_certificate() {
        assert!(unmarshal(&[0x30, 0x03, 0x02, 0x01, 0x00]).is_err());
    }

    #[test]
    fn subject_must_be_eleven_bytes() {
        assert!(profile_from_certificate(&[], b"PN:1").is_err());
    }
}
