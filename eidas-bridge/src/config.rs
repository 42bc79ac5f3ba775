// eidas/eidas-bridge/src/config.rs
// Numan Thabit 2025

use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bridge settings. Every field has a default, so a partial JSON file only
/// overrides what it names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub manifest: PathBuf,
    /// Label substring that picks the signing slot when a card exposes several.
    pub token_hint: String,
    pub poll_interval_ms: u64,
    /// Certificate of the issuing CA, for the binding circuit. Without it the
    /// card certificate must be self-signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_certificate: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("artifacts/manifest.json"),
            token_hint: "PIN1".into(),
            poll_interval_ms: 1_000,
            issuer_certificate: None,
        }
    }
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read bridge config {}", path.display()))?;
        serde_json::from_slice(&bytes).context("failed to parse bridge config json")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
