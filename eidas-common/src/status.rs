// eidas/eidas-common/src/status.rs
// Numan Thabit 2025

//! One-line JSON events the bridge prints to its controlling process.

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::solidity::SolidityCall;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusEvent {
    /// Exactly one matching card is present.
    Inserted,
    /// The card signed the challenge.
    Signed,
    /// Proof generated and verified locally.
    Generated { proof: SolidityCall },
    /// Session aborted. The message names the failing stage only.
    Error { message: String },
}

impl StatusEvent {
    /// Write the event as a single line and flush, so the parent sees it
    /// before the next blocking step.
    pub fn emit(&self, out: &mut impl Write) -> Result<()> {
        let line = serde_json::to_string(self).context("failed to encode status event")?;
        writeln!(out, "{line}").context("failed to write status event")?;
        out.flush().context("failed to flush status event")
    }
}
