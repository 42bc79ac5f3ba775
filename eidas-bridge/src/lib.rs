// eidas/eidas-bridge/src/lib.rs
// Numan Thabit 2025

//! Card-to-proof bridge: waits for a card, signs the host's challenge and
//! turns the result into a Groth16 proof for the on-chain verifier.

pub mod card;
pub mod config;
pub mod poll;
pub mod session;

pub use card::{CardError, CardGuard, CardService, CardSession, CardSigner, SoftCard, Token};
pub use config::BridgeConfig;
pub use poll::{CancellationToken, Clock, ManualClock, PollState, SystemClock, TokenPoller};
pub use session::{pad_challenge, prepare, report_startup_failure, Session, SessionError};
