// eidas/eidas-bridge/src/card.rs
// Numan Thabit 2025

//! Card-access seam.
//!
//! Hardware tokens sit behind [`CardService`]; the bridge only ever sees a
//! token list, a certificate, a public key and a signer. [`SoftCard`] is the
//! in-process implementation used by tests and hardware-free runs.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use eidas_common::signature::{public_key_sec1, sign_message};
use p384::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle of a connected card, as reported by enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub label: String,
    pub serial: String,
}

#[derive(Debug, Error)]
pub enum CardError {
    #[error("token enumeration failed: {0}")]
    Enumeration(String),
    #[error("card session could not be opened: {0}")]
    Session(String),
    #[error("PIN rejected")]
    PinRejected,
    #[error("expected exactly one certificate paired to the slot, found {0}")]
    CertificateCount(usize),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("closing the card session failed: {0}")]
    Close(String),
    #[error("waiting for a card was cancelled")]
    Cancelled,
}

/// Produces DER `SEQUENCE { INTEGER r, INTEGER s }` over a fixed-width
/// message that is used as the prehash directly.
pub trait CardSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CardError>;
}

/// What an unlocked slot hands out.
pub struct CardSession {
    /// DER certificate paired with the signing key.
    pub certificate: Vec<u8>,
    /// Uncompressed SEC1 public key.
    pub public_key: Vec<u8>,
    pub signer: Box<dyn CardSigner>,
}

pub trait CardService {
    fn enumerate_tokens(&mut self) -> Result<Vec<Token>, CardError>;

    fn filter_tokens(&self, hint: &str, tokens: Vec<Token>) -> Vec<Token> {
        filter_tokens(hint, tokens)
    }

    fn set_pin(&mut self, pin: &str);

    /// Unlock the slot of `token` and return its single paired certificate.
    fn get_signer(&mut self, token: &Token) -> Result<CardSession, CardError>;

    /// Release the slot. Must be idempotent.
    fn close(&mut self) -> Result<(), CardError>;
}

/// Keep tokens whose label contains `hint`. An empty hint keeps everything.
pub fn filter_tokens(hint: &str, tokens: Vec<Token>) -> Vec<Token> {
    if hint.is_empty() {
        return tokens;
    }
    tokens
        .into_iter()
        .filter(|token| token.label.contains(hint))
        .collect()
}

/// Owns a card service and closes it when dropped, on every exit path.
pub struct CardGuard<S: CardService> {
    service: S,
}

impl<S: CardService> CardGuard<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S: CardService> Deref for CardGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S: CardService> DerefMut for CardGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.service
    }
}

impl<S: CardService> Drop for CardGuard<S> {
    fn drop(&mut self) {
        match self.service.close() {
            Ok(()) => tracing::debug!("card session closed"),
            Err(err) => tracing::warn!(error = %err, "failed to close card session"),
        }
    }
}

/// Software card backed by a P-384 key and its certificate.
///
/// Presence can be scripted: the card stays invisible for the first
/// `insert_after` enumerations, which is how the polling loop is exercised.
pub struct SoftCard {
    key: SigningKey,
    certificates: Vec<Vec<u8>>,
    tokens: Vec<Token>,
    expected_pin: Option<String>,
    pin: Option<String>,
    insert_after: usize,
    enumerations: usize,
    open: bool,
    closes: Arc<AtomicUsize>,
}

impl SoftCard {
    pub const DEFAULT_LABEL: &'static str = "PIN1";

    pub fn new(key: SigningKey, certificate: Vec<u8>) -> Self {
        Self {
            key,
            certificates: vec![certificate],
            tokens: vec![Token {
                label: Self::DEFAULT_LABEL.into(),
                serial: "SOFT0001".into(),
            }],
            expected_pin: None,
            pin: None,
            insert_after: 0,
            enumerations: 0,
            open: false,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report these tokens instead of the single default one.
    pub fn with_tokens(mut self, tokens: Vec<Token>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Require this PIN before handing out the signer.
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.expected_pin = Some(pin.into());
        self
    }

    /// Pair an additional certificate with the slot.
    pub fn with_extra_certificate(mut self, certificate: Vec<u8>) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn insert_after(mut self, enumerations: usize) -> Self {
        self.insert_after = enumerations;
        self
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations
    }

    /// Shared counter of successful closes, observable after the card moved.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl CardService for SoftCard {
    fn enumerate_tokens(&mut self) -> Result<Vec<Token>, CardError> {
        self.enumerations += 1;
        if self.enumerations <= self.insert_after {
            return Ok(Vec::new());
        }
        Ok(self.tokens.clone())
    }

    fn set_pin(&mut self, pin: &str) {
        self.pin = Some(pin.to_owned());
    }

    fn get_signer(&mut self, token: &Token) -> Result<CardSession, CardError> {
        if !self.tokens.contains(token) {
            return Err(CardError::Session(format!("no token labelled {}", token.label)));
        }
        // a login attempt already holds the slot
        self.open = true;
        if let Some(expected) = &self.expected_pin {
            if self.pin.as_deref() != Some(expected.as_str()) {
                return Err(CardError::PinRejected);
            }
        }
        if self.certificates.len() != 1 {
            return Err(CardError::CertificateCount(self.certificates.len()));
        }
        Ok(CardSession {
            certificate: self.certificates[0].clone(),
            public_key: public_key_sec1(self.key.verifying_key()),
            signer: Box::new(SoftSigner {
                key: self.key.clone(),
            }),
        })
    }

    fn close(&mut self) -> Result<(), CardError> {
        if self.open {
            self.open = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct SoftSigner {
    key: SigningKey,
}

impl CardSigner for SoftSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CardError> {
        sign_message(&self.key, message).map_err(|err| CardError::Signing(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(label: &str) -> Token {
        Token {
            label: label.into(),
            serial: format!("{label}-serial"),
        }
    }

    fn key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 48]).unwrap()
    }

    #[test]
    fn empty_hint_keeps_all_tokens() {
        let tokens = vec![token("PIN1"), token("PIN2")];
        assert_eq!(filter_tokens("", tokens.clone()), tokens);
    }

    #[test]
    fn hint_matches_label_substring() {
        let tokens = vec![token("Auth (PIN1)"), token("Sign (PIN2)")];
        assert_eq!(filter_tokens("PIN1", tokens), vec![token("Auth (PIN1)")]);
    }

    #[test]
    fn guard_closes_open_session_once() {
        let card = SoftCard::new(key(), vec![0x30, 0x00]);
        let closes = card.close_counter();
        {
            let mut guard = CardGuard::new(card);
            let token = guard.enumerate_tokens().unwrap().remove(0);
            guard.get_signer(&token).unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wrong_pin_is_rejected() {
        let mut card = SoftCard::new(key(), vec![0x30, 0x00]).with_pin("1234");
        let token = card.enumerate_tokens().unwrap().remove(0);
        card.set_pin("0000");
        assert!(matches!(card.get_signer(&token), Err(CardError::PinRejected)));
    }

    #[test]
    fn two_paired_certificates_are_refused() {
        let mut card =
            SoftCard::new(key(), vec![0x30, 0x00]).with_extra_certificate(vec![0x30, 0x00]);
        let token = card.enumerate_tokens().unwrap().remove(0);
        assert!(matches!(
            card.get_signer(&token),
            Err(CardError::CertificateCount(2))
        ));
    }
}
