// eidas/eidas-bridge/src/session.rs
// Numan Thabit 2025

//! One card session over the line protocol.
//!
//! The host reads status events from our output and writes the PIN and the
//! challenge, one per line. Every failure ends the session with a single
//! `ERROR` line naming the stage; the card is closed before that line is
//! written.

use std::io::{BufRead, Write};

use eidas_circuit::{
    binding::tbs_digest, BindingCircuitInput, BindingPublicInputs, BindingWitness,
    CertificateProfile, EcdsaSignature, MinimalCircuitInput, MinimalPublicInputs, MinimalWitness,
    BINDING_CHALLENGE_LEN, MINIMAL_CHALLENGE_LEN,
};
use anyhow::Context;
use eidas_common::{
    cert, load_prover_artifacts,
    signature::{unmarshal_asn1_signature, verify_message},
    CircuitKind, CodecError, ProverArtifacts, SolidityCall, StatusEvent,
};
use eidas_prover::{prove_with_artifacts, CircuitInput, HandshakeError};
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use crate::{
    card::{CardError, CardGuard, CardService, CardSession},
    config::BridgeConfig,
    poll::{CancellationToken, Clock, TokenPoller},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("card: {0}")]
    Card(#[from] CardError),
    #[error("card: public key does not match the paired certificate")]
    KeyMismatch,
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("challenge: at most {max} bytes fit, got {actual}")]
    ChallengeTooLong { max: usize, actual: usize },
    #[error("encoding: {0}")]
    Codec(#[from] CodecError),
    #[error("artifacts: {0}")]
    Artifacts(String),
    #[error("proof: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("status: {0:#}")]
    Status(anyhow::Error),
}

/// Right-pad `challenge` with zeros to the signing width.
pub fn pad_challenge(challenge: &[u8], width: usize) -> Result<Vec<u8>, SessionError> {
    if challenge.len() > width {
        return Err(SessionError::ChallengeTooLong {
            max: width,
            actual: challenge.len(),
        });
    }
    let mut padded = challenge.to_vec();
    padded.resize(width, 0);
    Ok(padded)
}

/// Challenge width the circuit behind `kind` takes as public input.
pub fn challenge_width(kind: CircuitKind) -> usize {
    match kind {
        CircuitKind::Minimal => MINIMAL_CHALLENGE_LEN,
        CircuitKind::Binding => BINDING_CHALLENGE_LEN,
    }
}

/// Sign the padded challenge on the card and check the answer on the host.
pub fn sign_challenge(card: &CardSession, padded: &[u8]) -> Result<EcdsaSignature, SessionError> {
    let der = card.signer.sign(padded)?;
    let signature = unmarshal_asn1_signature(&der)?;
    verify_message(&card.public_key, padded, &signature)?;
    Ok(signature)
}

pub fn assemble_minimal_input(
    challenge: &[u8],
    challenge_signature: EcdsaSignature,
    card: &CardSession,
) -> Result<MinimalCircuitInput, SessionError> {
    Ok(MinimalCircuitInput {
        public: MinimalPublicInputs {
            challenge: fixed(challenge)?,
        },
        witness: MinimalWitness {
            subject_pubkey: card.public_key.clone(),
            challenge_signature,
        },
    })
}

/// Build the binding witness from the card certificate.
///
/// The subject input is read from the certificate at the profile offset.
/// The certificate signature is checked against the issuer key on the host,
/// so a wrong issuer shows up as an encoding failure instead of a proof that
/// does not verify.
pub fn assemble_binding_input(
    profile: &CertificateProfile,
    challenge: &[u8],
    challenge_signature: EcdsaSignature,
    card: &CardSession,
    issuer_pubkey: Option<&[u8]>,
) -> Result<BindingCircuitInput, SessionError> {
    let parsed = cert::unmarshal(&card.certificate)?;
    parsed.ensure_round_trip()?;
    parsed.ensure_supported_algorithm()?;

    let subject_pubkey = parsed.subject_pubkey()?;
    if subject_pubkey != card.public_key {
        return Err(SessionError::KeyMismatch);
    }
    let issuer_pubkey = issuer_pubkey
        .map(<[u8]>::to_vec)
        .unwrap_or_else(|| subject_pubkey.clone());
    let certificate_signature = parsed.signature()?;
    let tbs = parsed.tbs().to_vec();
    verify_message(&issuer_pubkey, &tbs_digest(&tbs), &certificate_signature)?;

    let subject = tbs
        .get(profile.subject.offset..profile.subject.end())
        .ok_or(CodecError::NotFound("subject"))?;

    Ok(BindingCircuitInput {
        public: BindingPublicInputs {
            challenge: fixed(challenge)?,
            subject: fixed(subject)?,
        },
        witness: BindingWitness {
            challenge_signature,
            certificate: card.certificate.clone(),
            tbs_certificate: tbs,
            subject_pubkey,
            issuer_pubkey,
            certificate_signature,
        },
    })
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], SessionError> {
    bytes
        .try_into()
        .map_err(|_| SessionError::Protocol(format!("expected {N} bytes, got {}", bytes.len())))
}

fn read_line<R: BufRead>(input: &mut R, what: &str) -> Result<String, SessionError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(SessionError::Protocol(format!(
            "input closed before the {what} was sent"
        )));
    }
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_owned())
}

fn emit<W: Write>(out: &mut W, event: StatusEvent) -> Result<(), SessionError> {
    event.emit(out).map_err(SessionError::Status)
}

/// Load the artifacts and the optional issuer key named by `config`, and
/// build a session around `card`.
pub fn prepare<S: CardService, C: Clock>(
    card: S,
    config: &BridgeConfig,
    clock: C,
    cancel: CancellationToken,
) -> anyhow::Result<Session<S, C>> {
    let artifacts = load_prover_artifacts(&config.manifest)
        .with_context(|| format!("failed to load manifest {}", config.manifest.display()))?;
    let mut session = Session::new(card, artifacts, config, clock, cancel);
    if let Some(path) = &config.issuer_certificate {
        let der = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let issuer = cert::unmarshal(&der).context("failed to parse issuer certificate")?;
        session = session.with_issuer_pubkey(issuer.subject_pubkey()?);
    }
    Ok(session)
}

/// Report a failure that happened before any session could start, as the
/// same single `ERROR` line a failed session ends with.
pub fn report_startup_failure<W: Write>(out: &mut W, err: &anyhow::Error) {
    tracing::error!(error = format!("{err:#}"), "bridge failed to start");
    let event = StatusEvent::Error {
        message: format!("startup: {err:#}"),
    };
    if let Err(emit_err) = event.emit(out) {
        tracing::warn!(error = %emit_err, "failed to report startup error");
    }
}

pub struct Session<S: CardService, C: Clock> {
    card: CardGuard<S>,
    clock: C,
    cancel: CancellationToken,
    artifacts: ProverArtifacts,
    poller: TokenPoller,
    issuer_pubkey: Option<Vec<u8>>,
}

impl<S: CardService, C: Clock> Session<S, C> {
    pub fn new(
        card: S,
        artifacts: ProverArtifacts,
        config: &BridgeConfig,
        clock: C,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            card: CardGuard::new(card),
            clock,
            cancel,
            artifacts,
            poller: TokenPoller::new(config.token_hint.clone(), config.poll_interval()),
            issuer_pubkey: None,
        }
    }

    /// Issuer key for certificates that are not self-signed.
    pub fn with_issuer_pubkey(mut self, issuer_pubkey: Vec<u8>) -> Self {
        self.issuer_pubkey = Some(issuer_pubkey);
        self
    }

    /// Run the whole protocol. On failure the error is also written to `out`
    /// as an `ERROR` event.
    pub fn run<R, W, G>(self, mut input: R, out: &mut W, rng: &mut G) -> Result<SolidityCall, SessionError>
    where
        R: BufRead,
        W: Write,
        G: RngCore + CryptoRng,
    {
        let result = self.drive(&mut input, out, rng);
        if let Err(err) = &result {
            tracing::error!(error = %err, "session aborted");
            let event = StatusEvent::Error {
                message: err.to_string(),
            };
            if let Err(emit_err) = event.emit(out) {
                tracing::warn!(error = %emit_err, "failed to report session error");
            }
        }
        result
    }

    fn drive<R, W, G>(self, input: &mut R, out: &mut W, rng: &mut G) -> Result<SolidityCall, SessionError>
    where
        R: BufRead,
        W: Write,
        G: RngCore + CryptoRng,
    {
        let Self {
            mut card,
            clock,
            cancel,
            artifacts,
            mut poller,
            issuer_pubkey,
        } = self;

        let token = poller.wait(&mut *card, &clock, &cancel)?;
        emit(out, StatusEvent::Inserted)?;

        let pin = read_line(input, "PIN")?;
        let challenge = read_line(input, "challenge")?;

        let kind = artifacts.descriptor.kind;
        let padded = pad_challenge(challenge.as_bytes(), challenge_width(kind))?;

        card.set_pin(&pin);
        let session = card.get_signer(&token)?;
        let signature = sign_challenge(&session, &padded)?;
        tracing::info!(label = %token.label, "card signed the challenge");
        emit(out, StatusEvent::Signed)?;

        let circuit_input = match kind {
            CircuitKind::Minimal => {
                CircuitInput::Minimal(assemble_minimal_input(&padded, signature, &session)?)
            }
            CircuitKind::Binding => {
                let profile = artifacts
                    .descriptor
                    .binding_profile()
                    .map_err(|err| SessionError::Artifacts(format!("{err:#}")))?;
                CircuitInput::Binding(assemble_binding_input(
                    profile,
                    &padded,
                    signature,
                    &session,
                    issuer_pubkey.as_deref(),
                )?)
            }
        };
        // nothing below needs the card
        drop(session);
        drop(card);

        let generated = prove_with_artifacts(&artifacts, circuit_input, rng)?;
        let call = generated.solidity_call();
        emit(
            out,
            StatusEvent::Generated {
                proof: call.clone(),
            },
        )?;
        Ok(call)
    }
}
