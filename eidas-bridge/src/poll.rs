// eidas/eidas-bridge/src/poll.rs
// Numan Thabit 2025

//! Card-presence polling as an explicit state machine.
//!
//! The only blocking wait in a session. Time comes from an injected
//! [`Clock`] and the loop checks a [`CancellationToken`] before every
//! attempt, so tests run without real sleeps and the host can stop a bridge
//! that is still waiting for a card.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use crate::card::{CardError, CardService, Token};

pub trait Clock {
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Records requested sleeps instead of blocking.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Cloneable stop flag shared with whoever may abort the wait.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollState {
    /// Nothing usable seen yet: no tokens, or enumeration failed.
    Waiting,
    /// Several tokens present and the hint did not narrow them to one.
    Ambiguous { candidates: usize },
    Ready(Token),
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Cancelled)
    }
}

pub struct TokenPoller {
    hint: String,
    interval: Duration,
    attempts: u64,
    state: PollState,
}

impl TokenPoller {
    pub fn new(hint: impl Into<String>, interval: Duration) -> Self {
        Self {
            hint: hint.into(),
            interval,
            attempts: 0,
            state: PollState::Waiting,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// One enumeration attempt. Terminal states are sticky.
    pub fn step<S: CardService + ?Sized>(&mut self, service: &mut S) -> &PollState {
        if self.state.is_terminal() {
            return &self.state;
        }
        self.attempts += 1;
        self.state = match service.enumerate_tokens() {
            Err(err) => {
                tracing::debug!(attempt = self.attempts, error = %err, "token enumeration failed, retrying");
                PollState::Waiting
            }
            Ok(tokens) if tokens.is_empty() => {
                tracing::debug!(attempt = self.attempts, "no card present");
                PollState::Waiting
            }
            Ok(tokens) => {
                // a lone token is taken as is, the hint only disambiguates
                let mut tokens = if tokens.len() > 1 {
                    service.filter_tokens(&self.hint, tokens)
                } else {
                    tokens
                };
                if tokens.len() == 1 {
                    PollState::Ready(tokens.remove(0))
                } else {
                    tracing::debug!(
                        attempt = self.attempts,
                        candidates = tokens.len(),
                        hint = %self.hint,
                        "token hint did not select a single card"
                    );
                    PollState::Ambiguous {
                        candidates: tokens.len(),
                    }
                }
            }
        };
        &self.state
    }

    /// Poll until exactly one token is selected or `cancel` fires.
    pub fn wait<S, C>(
        &mut self,
        service: &mut S,
        clock: &C,
        cancel: &CancellationToken,
    ) -> Result<Token, CardError>
    where
        S: CardService + ?Sized,
        C: Clock + ?Sized,
    {
        loop {
            if cancel.is_cancelled() {
                self.state = PollState::Cancelled;
            }
            match self.step(service).clone() {
                PollState::Ready(token) => {
                    tracing::info!(attempts = self.attempts, label = %token.label, "card present");
                    return Ok(token);
                }
                PollState::Cancelled => {
                    tracing::warn!(attempts = self.attempts, "card polling cancelled");
                    return Err(CardError::Cancelled);
                }
                PollState::Waiting | PollState::Ambiguous { .. } => clock.sleep(self.interval),
            }
        }
    }
}
