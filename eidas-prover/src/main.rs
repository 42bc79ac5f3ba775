// eidas/eidas-prover/src/main.rs
// Numan Thabit 2025

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eidas_common::{load_prover_artifacts, write_atomic, CircuitKind};
use eidas_prover::{prove_with_artifacts, CircuitInput};

/// Prove a prepared witness against persisted artifacts.
#[derive(Parser)]
struct Args {
    /// Circuit input JSON (public inputs plus witness) for the manifest's circuit.
    #[arg(long)]
    input_json: PathBuf,
    #[arg(long, default_value = "artifacts/manifest.json")]
    manifest: PathBuf,
    /// Optional path to write a proof bundle (compressed proof + public inputs).
    #[arg(long)]
    bundle_json: Option<PathBuf>,
    /// Where to write the on-chain call tuple. Printed to stdout when omitted.
    #[arg(long)]
    solidity_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eidas_prover=info,eidas_verifier=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let artifacts = load_prover_artifacts(&args.manifest)
        .with_context(|| format!("failed to load manifest {}", args.manifest.display()))?;

    let json = fs::read_to_string(&args.input_json)
        .with_context(|| format!("failed to read {}", args.input_json.display()))?;
    let input = match artifacts.descriptor.kind {
        CircuitKind::Minimal => CircuitInput::Minimal(
            serde_json::from_str(&json).context("failed to parse minimal circuit input")?,
        ),
        CircuitKind::Binding => CircuitInput::Binding(
            serde_json::from_str(&json).context("failed to parse binding circuit input")?,
        ),
    };

    let generated = prove_with_artifacts(&artifacts, input, &mut OsRng)?;

    if let Some(path) = args.bundle_json.as_ref() {
        let bundle = generated.bundle()?;
        let json = serde_json::to_vec_pretty(&bundle).context("failed to serialize proof bundle")?;
        write_atomic(path, &json)?;
    }

    let call = serde_json::to_vec_pretty(&generated.solidity_call())
        .context("failed to serialize solidity call")?;
    match args.solidity_json.as_ref() {
        Some(path) => write_atomic(path, &call)?,
        None => println!("{}", String::from_utf8_lossy(&call)),
    }
    Ok(())
}
