// eidas/eidas-test-fixtures/src/lib.rs
// Numan Thabit 2025

//! Deterministic certificate, witnesses and Groth16 artifacts shared by the
//! workspace tests.
//!
//! The certificate is self-signed over P-384 and laid out so that
//! `CertificateProfile::eidas()` measures it exactly.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use eidas_circuit::{
    binding::tbs_digest, BindingCircuitInput, BindingPublicInputs, BindingWitness,
    CertificateProfile, EcdsaSignature, MinimalCircuitInput, MinimalPublicInputs, MinimalWitness,
    BINDING_CHALLENGE_LEN, MINIMAL_CHALLENGE_LEN,
};
use eidas_common::{
    cert::{profile_from_certificate, ECDSA_WITH_SHA256},
    signature::{public_key_sec1, sign_message, unmarshal_asn1_signature},
    CircuitDescriptor,
};
use eidas_prover::{prove_minimal, setup_minimal, write_artifacts, GeneratedProof, ProverParams};
use once_cell::sync::OnceCell;
use p384::ecdsa::SigningKey;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use x509_cert::{
    attr::AttributeTypeAndValue,
    der::{
        asn1::{BitString, OctetString, SetOfVec, UtcTime},
        oid::AssociatedOid,
        Any, Encode, Tag,
    },
    ext::{
        pkix::{AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier},
        Extension,
    },
    name::{Name, RdnSequence, RelativeDistinguishedName},
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned},
    time::{Time, Validity},
    Certificate, TbsCertificate, Version,
};

/// Subject identifier embedded in the certificate, the binding circuit's
/// public subject input.
pub const SUBJECT: &[u8; 11] = b"PN:11223344";
/// Session challenge used throughout the tests.
pub const CHALLENGE: &[u8; BINDING_CHALLENGE_LEN] = b"0123456789abcdef";

const KEY_SEED: u64 = 0x00e1_da55;
const SETUP_SEED: u64 = 42;
const PROVE_SEED: u64 = 7;
const CREATED_AT_UNIX: u64 = 1_760_000_000;

static CERTIFICATE: OnceCell<TestCertificate> = OnceCell::new();
static MINIMAL: OnceCell<MinimalFixtures> = OnceCell::new();

/// Self-signed certificate plus the key that signed it.
pub struct TestCertificate {
    signing_key: SigningKey,
    der: Vec<u8>,
    tbs: Vec<u8>,
    subject_pubkey: Vec<u8>,
    signature: EcdsaSignature,
}

impl TestCertificate {
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    /// Uncompressed SEC1 key, `04 || X || Y`.
    pub fn subject_pubkey(&self) -> &[u8] {
        &self.subject_pubkey
    }

    pub fn certificate_signature(&self) -> &EcdsaSignature {
        &self.signature
    }

    /// Sign `message` with the card key, as the circuit expects it.
    pub fn sign_challenge(&self, message: &[u8]) -> Result<EcdsaSignature> {
        let der = sign_message(&self.signing_key, message).context("sign challenge")?;
        unmarshal_asn1_signature(&der).context("parse challenge signature")
    }
}

/// Lazily built certificate shared across tests.
pub fn certificate() -> &'static TestCertificate {
    CERTIFICATE.get_or_init(|| build_certificate().expect("failed to build test certificate"))
}

fn build_certificate() -> Result<TestCertificate> {
    let signing_key = SigningKey::random(&mut ChaCha20Rng::seed_from_u64(KEY_SEED));
    let subject_pubkey = public_key_sec1(signing_key.verifying_key());

    // RFC 6979 is deterministic, so vary the serial until both scalars need
    // the DER sign byte, which is the layout the production profile expects.
    for counter in 0u32..4096 {
        let body = tbs_certificate(&serial(counter), &subject_pubkey)?;
        let tbs = body.to_der()?;
        let signature_der = sign_message(&signing_key, &tbs_digest(&tbs))?;
        let signature = unmarshal_asn1_signature(&signature_der)?;
        if signature.r[0] & 0x80 == 0 || signature.s[0] & 0x80 == 0 {
            continue;
        }
        let der = certificate_der(body, &signature_der)?;
        let measured = profile_from_certificate(&der, SUBJECT)?;
        ensure!(
            measured == CertificateProfile::eidas(),
            "test certificate layout drifted from the production profile: {measured:?}"
        );
        return Ok(TestCertificate {
            signing_key,
            der,
            tbs,
            subject_pubkey,
            signature,
        });
    }
    anyhow::bail!("no serial produced a padded certificate signature")
}

/// Binding circuit input for [`CHALLENGE`] and [`SUBJECT`].
pub fn binding_input() -> Result<BindingCircuitInput> {
    let cert = certificate();
    Ok(BindingCircuitInput {
        public: BindingPublicInputs {
            challenge: *CHALLENGE,
            subject: *SUBJECT,
        },
        witness: BindingWitness {
            challenge_signature: cert.sign_challenge(CHALLENGE)?,
            certificate: cert.der.clone(),
            tbs_certificate: cert.tbs.clone(),
            subject_pubkey: cert.subject_pubkey.clone(),
            issuer_pubkey: cert.subject_pubkey.clone(),
            certificate_signature: cert.signature.clone(),
        },
    })
}

/// Minimal circuit input. The challenge is right padded with zeros, the way
/// the bridge pads what it reads from the host.
pub fn minimal_input() -> Result<MinimalCircuitInput> {
    let cert = certificate();
    let mut challenge = [0u8; MINIMAL_CHALLENGE_LEN];
    challenge[..CHALLENGE.len()].copy_from_slice(CHALLENGE);
    Ok(MinimalCircuitInput {
        public: MinimalPublicInputs { challenge },
        witness: MinimalWitness {
            subject_pubkey: cert.subject_pubkey.clone(),
            challenge_signature: cert.sign_challenge(&challenge)?,
        },
    })
}

/// Minimal circuit keys, a proof for [`minimal_input`] and the same keys
/// persisted as a manifest directory.
pub struct MinimalFixtures {
    params: ProverParams,
    proof: GeneratedProof,
    dir: TempDir,
}

impl MinimalFixtures {
    pub fn params(&self) -> &ProverParams {
        &self.params
    }

    pub fn proof(&self) -> &GeneratedProof {
        &self.proof
    }

    pub fn artifacts_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join(eidas_common::MANIFEST_FILE)
    }
}

/// Expensive: Groth16 setup and one proof over the emulated P-384 verifier.
/// Only `#[ignore]`d tests should call this.
pub fn minimal_fixtures() -> &'static MinimalFixtures {
    MINIMAL.get_or_init(|| build_minimal_fixtures().expect("failed to build minimal fixtures"))
}

fn build_minimal_fixtures() -> Result<MinimalFixtures> {
    let params = setup_minimal(&mut ChaCha20Rng::seed_from_u64(SETUP_SEED))?;
    let proof = prove_minimal(
        &params.pk,
        minimal_input()?,
        &mut ChaCha20Rng::seed_from_u64(PROVE_SEED),
    )?;
    let dir = tempfile::tempdir().context("create artifact dir")?;
    write_artifacts(dir.path(), &CircuitDescriptor::minimal(), &params, CREATED_AT_UNIX)?;
    Ok(MinimalFixtures { params, proof, dir })
}

fn serial(counter: u32) -> Vec<u8> {
    let mut serial = vec![0x01];
    serial.extend_from_slice(&[0x5a; 11]);
    serial.extend_from_slice(&counter.to_be_bytes());
    serial
}

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// 2025-01-01T00:00:00Z and 2035-01-01T00:00:00Z.
const NOT_BEFORE_UNIX: u64 = 1_735_689_600;
const NOT_AFTER_UNIX: u64 = 2_051_222_400;

fn name(attributes: &[(ObjectIdentifier, Tag, &[u8])]) -> Result<Name> {
    let rdns = attributes
        .iter()
        .map(|&(oid, tag, value)| -> Result<RelativeDistinguishedName> {
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value)?,
            };
            Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RdnSequence(rdns))
}

fn extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> Result<Extension> {
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}

fn utc(unix: u64) -> Result<Time> {
    Ok(Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(unix))?))
}

fn signature_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ECDSA_WITH_SHA256,
        parameters: None,
    }
}

fn tbs_certificate(serial: &[u8], pubkey: &[u8]) -> Result<TbsCertificate> {
    let issuer = name(&[
        (OID_COUNTRY, Tag::PrintableString, b"EE"),
        (OID_ORGANIZATION, Tag::Utf8String, b"TestOrg"),
        (OID_COMMON_NAME, Tag::Utf8String, b"TEST"),
    ])?;
    let subject = name(&[
        (OID_COMMON_NAME, Tag::Utf8String, SUBJECT),
        (OID_COUNTRY, Tag::PrintableString, b"EE"),
        (OID_ORGANIZATION, Tag::Utf8String, b"TestOrg"),
    ])?;
    let subject_public_key_info = SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: OID_EC_PUBLIC_KEY,
            parameters: Some(Any::from(OID_SECP384R1)),
        },
        subject_public_key: BitString::from_bytes(pubkey)?,
    };

    let digest = Sha256::digest(pubkey);
    let key_id = OctetString::new(&digest[..15])?;
    let extensions = vec![
        extension(&KeyUsage(KeyUsages::NonRepudiation.into()), true)?,
        extension(
            &BasicConstraints {
                ca: false,
                path_len_constraint: None,
            },
            false,
        )?,
        extension(&SubjectKeyIdentifier(key_id.clone()), false)?,
        extension(
            &AuthorityKeyIdentifier {
                key_identifier: Some(key_id),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            },
            false,
        )?,
    ];

    Ok(TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(serial)?,
        signature: signature_algorithm(),
        issuer,
        validity: Validity {
            not_before: utc(NOT_BEFORE_UNIX)?,
            not_after: utc(NOT_AFTER_UNIX)?,
        },
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

fn certificate_der(tbs_certificate: TbsCertificate, signature_der: &[u8]) -> Result<Vec<u8>> {
    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm: signature_algorithm(),
        signature: BitString::from_bytes(signature_der)?,
    };
    Ok(certificate.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_common::signature::verify_message;

    #[test]
    fn name_encodes_one_attribute_per_rdn() {
        let der = name(&[(OID_COUNTRY, Tag::PrintableString, b"EE")])
            .unwrap()
            .to_der()
            .unwrap();
        assert_eq!(
            der,
            [0x30, 0x0d, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, b'E', b'E']
        );
    }

    #[test]
    fn non_critical_extension_omits_the_flag() {
        let ext = extension(
            &BasicConstraints {
                ca: false,
                path_len_constraint: None,
            },
            false,
        )
        .unwrap();
        assert_eq!(
            ext.to_der().unwrap(),
            [0x30, 0x09, 0x06, 0x03, 0x55, 0x1d, 0x13, 0x04, 0x02, 0x30, 0x00]
        );
    }

    #[test]
    fn certificate_envelope_matches_production_profile() {
        let cert = certificate();
        let profile = CertificateProfile::eidas();
        assert_eq!(profile.envelope_of(cert.der()).unwrap(), profile.envelope);
        assert_eq!(&cert.der()[profile.tbs.offset..profile.tbs.end()], cert.tbs());
    }

    #[test]
    fn certificate_matches_production_profile() {
        let cert = certificate();
        let profile = CertificateProfile::eidas();
        assert_eq!(cert.der().len(), profile.cert_len);
        assert_eq!(cert.tbs().len(), profile.tbs_len);
        let subject = profile.subject;
        assert_eq!(&cert.tbs()[subject.offset..subject.end()], SUBJECT);
        let key = profile.subject_pubkey;
        assert_eq!(&cert.tbs()[key.offset..key.end()], cert.subject_pubkey());
    }

    #[test]
    fn certificate_signature_verifies_over_tbs_digest() {
        let cert = certificate();
        verify_message(
            cert.subject_pubkey(),
            &tbs_digest(cert.tbs()),
            cert.certificate_signature(),
        )
        .unwrap();
    }

    #[test]
    fn inputs_pass_host_checks() {
        let binding = binding_input().unwrap();
        binding
            .witness
            .preflight(&CertificateProfile::eidas(), &binding.public)
            .unwrap();
        let minimal = minimal_input().unwrap();
        verify_message(
            &minimal.witness.subject_pubkey,
            &minimal.public.challenge,
            &minimal.witness.challenge_signature,
        )
        .unwrap();
    }
}
