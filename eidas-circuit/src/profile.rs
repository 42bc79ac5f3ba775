// eidas/eidas-circuit/src/profile.rs
// Numan Thabit 2025

//! Fixed byte layout of the supported certificate profile.
//!
//! The circuit does no ASN.1 parsing. Every field it cares about is pinned to
//! an offset that is a circuit parameter, so one compiled circuit serves every
//! certificate with this exact layout.

use serde::{Deserialize, Serialize};

use crate::{curve::P384_BYTES, CircuitError};

pub const SUBJECT_LEN: usize = 11;
/// Uncompressed SEC1 point: `04 || X || Y`.
pub const PUBKEY_LEN: usize = 1 + 2 * P384_BYTES;

/// Half-open byte range `[offset, offset + len)` inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn contains(&self, position: usize) -> bool {
        position >= self.offset && position < self.end()
    }

    pub fn fits_in(&self, container_len: usize) -> bool {
        self.offset
            .checked_add(self.len)
            .map_or(false, |end| end <= container_len)
    }
}

/// How the two signature INTEGERs appear inside the certificate.
///
/// Both variants use a fixed 48-byte width per scalar. `Padded` is what DER
/// produces when the scalar's top bit is set (a `00` sign byte is prepended),
/// `Compact` is the layout when it is clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    /// `02 30 R 02 30 S`
    Compact,
    /// `02 31 00 R 02 31 00 S`
    Padded,
}

impl SignatureEncoding {
    /// Bytes preceding each scalar.
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            Self::Compact => &[0x02, 0x30],
            Self::Padded => &[0x02, 0x31, 0x00],
        }
    }

    pub fn encoded_len(&self) -> usize {
        2 * (self.prefix().len() + P384_BYTES)
    }
}

/// Outer SEQUENCE header, ecdsa-with-SHA256 AlgorithmIdentifier, BIT STRING
/// header and signature SEQUENCE header of a 502-byte certificate.
const EIDAS_ENVELOPE: [u8; 21] = [
    0x30, 0x82, 0x01, 0xf2, // Certificate
    0x30, 0x0a, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02, // signatureAlgorithm
    0x03, 0x69, 0x00, // signatureValue
    0x30, 0x66, // Ecdsa-Sig-Value
];

/// Layout of the certificate the circuit is compiled for.
///
/// Offsets of `subject` and `subject_pubkey` are relative to the TBS buffer,
/// `tbs` and `signature` are relative to the full certificate. Every
/// certificate byte outside those two ranges is fixed by the profile and
/// listed, in order, in `envelope`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateProfile {
    pub tbs_len: usize,
    pub cert_len: usize,
    pub tbs: ByteRange,
    pub subject: ByteRange,
    pub subject_pubkey: ByteRange,
    pub signature: ByteRange,
    pub signature_encoding: SignatureEncoding,
    #[serde(with = "crate::witness::hex_vec")]
    pub envelope: Vec<u8>,
}

impl Default for CertificateProfile {
    fn default() -> Self {
        Self::eidas()
    }
}

impl CertificateProfile {
    /// Production profile, checked against a sample card certificate.
    pub fn eidas() -> Self {
        Self {
            tbs_len: 379,
            cert_len: 502,
            tbs: ByteRange::new(4, 379),
            subject: ByteRange::new(132, SUBJECT_LEN),
            subject_pubkey: ByteRange::new(197, PUBKEY_LEN),
            signature: ByteRange::new(400, 102),
            signature_encoding: SignatureEncoding::Padded,
            envelope: EIDAS_ENVELOPE.to_vec(),
        }
    }

    /// Certificate positions covered by `envelope`, ascending.
    pub fn envelope_positions(&self) -> Vec<usize> {
        (0..self.cert_len)
            .filter(|&pos| !self.tbs.contains(pos) && !self.signature.contains(pos))
            .collect()
    }

    /// Bytes of `certificate` at the envelope positions.
    pub fn envelope_of(&self, certificate: &[u8]) -> Option<Vec<u8>> {
        self.envelope_positions()
            .into_iter()
            .map(|pos| certificate.get(pos).copied())
            .collect()
    }

    /// Reject any profile whose ranges do not fit their buffers or whose field
    /// widths differ from the fixed widths the gadgets emit.
    pub fn validate(&self) -> Result<(), CircuitError> {
        check_range("subject", &self.subject, SUBJECT_LEN, self.tbs_len)?;
        check_range("subject pubkey", &self.subject_pubkey, PUBKEY_LEN, self.tbs_len)?;
        check_range(
            "signature",
            &self.signature,
            self.signature_encoding.encoded_len(),
            self.cert_len,
        )?;
        if self.tbs_len >= self.cert_len {
            return Err(CircuitError::Profile(format!(
                "tbs length {} must be shorter than certificate length {}",
                self.tbs_len, self.cert_len
            )));
        }
        check_range("tbs", &self.tbs, self.tbs_len, self.cert_len)?;
        if self.tbs.offset < self.signature.end() && self.signature.offset < self.tbs.end() {
            return Err(CircuitError::Profile("tbs and signature ranges overlap".into()));
        }
        let envelope_len = self.cert_len - self.tbs.len - self.signature.len;
        if self.envelope.len() != envelope_len {
            return Err(CircuitError::Profile(format!(
                "envelope must cover the remaining {envelope_len} certificate bytes, profile lists {}",
                self.envelope.len()
            )));
        }
        Ok(())
    }
}

fn check_range(
    label: &str,
    range: &ByteRange,
    expected_len: usize,
    container_len: usize,
) -> Result<(), CircuitError> {
    if range.len != expected_len {
        return Err(CircuitError::Profile(format!(
            "{label} must be {expected_len} bytes, profile says {}",
            range.len
        )));
    }
    if !range.fits_in(container_len) {
        return Err(CircuitError::Profile(format!(
            "{label} range {}..{} exceeds buffer of {container_len} bytes",
            range.offset,
            range.offset.saturating_add(range.len)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eidas_profile_is_valid() {
        CertificateProfile::eidas().validate().unwrap();
        assert_eq!(CertificateProfile::default(), CertificateProfile::eidas());
    }

    #[test]
    fn signature_widths() {
        assert_eq!(SignatureEncoding::Compact.encoded_len(), 100);
        assert_eq!(SignatureEncoding::Padded.encoded_len(), 102);
    }

    #[test]
    fn wrong_signature_width_is_profile_error() {
        let mut profile = CertificateProfile::eidas();
        profile.signature_encoding = SignatureEncoding::Compact;
        assert!(matches!(profile.validate(), Err(CircuitError::Profile(_))));
    }

    #[test]
    fn range_past_buffer_is_profile_error() {
        let mut profile = CertificateProfile::eidas();
        profile.subject_pubkey.offset = profile.tbs_len - 10;
        assert!(matches!(profile.validate(), Err(CircuitError::Profile(_))));
    }

    #[test]
    fn envelope_covers_everything_outside_tbs_and_signature() {
        let profile = CertificateProfile::eidas();
        let positions = profile.envelope_positions();
        assert_eq!(positions.len(), profile.envelope.len());
        assert_eq!(&positions[..4], &[0, 1, 2, 3]);
        assert_eq!(positions[4], 383);
        assert_eq!(positions[20], 399);
    }

    #[test]
    fn short_envelope_is_profile_error() {
        let mut profile = CertificateProfile::eidas();
        profile.envelope.pop();
        assert!(matches!(profile.validate(), Err(CircuitError::Profile(_))));
    }

    #[test]
    fn overlapping_tbs_and_signature_is_profile_error() {
        let mut profile = CertificateProfile::eidas();
        profile.tbs.offset = 100;
        assert!(matches!(profile.validate(), Err(CircuitError::Profile(_))));
    }

    #[test]
    fn profile_json_round_trip() {
        let json = serde_json::to_string(&CertificateProfile::eidas()).unwrap();
        assert!(json.contains("\"padded\""));
        assert!(json.contains("\"envelope\":\"308201f2300a06082a8648ce3d0403020369003066\""));
        let decoded: CertificateProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, CertificateProfile::eidas());
    }
}
