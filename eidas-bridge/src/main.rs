// eidas/eidas-bridge/src/main.rs
// Numan Thabit 2025

use std::{fs, io, path::PathBuf, process::ExitCode, thread};

use anyhow::{Context, Result};
use clap::Parser;
use p384::{ecdsa::SigningKey, pkcs8::DecodePrivateKey};
use rand::rngs::OsRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eidas_bridge::{
    prepare, report_startup_failure, BridgeConfig, CancellationToken, Session, SoftCard,
    SystemClock,
};

/// Drive one card session: status events on stdout, PIN and challenge on stdin.
#[derive(Parser)]
struct Args {
    /// JSON bridge config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    manifest: Option<PathBuf>,
    #[arg(long)]
    token_hint: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// PKCS#8 DER private key of the software card.
    #[arg(long)]
    card_key: PathBuf,
    /// DER certificate paired with the card key.
    #[arg(long)]
    card_cert: PathBuf,
    /// DER certificate of the issuer, for certificates that are not self-signed.
    #[arg(long)]
    issuer_cert: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eidas_bridge=info,eidas_prover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let mut stdout = io::stdout();
    let session = match start(args) {
        Ok(session) => session,
        Err(err) => {
            report_startup_failure(&mut stdout, &err);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    match session.run(stdin.lock(), &mut stdout, &mut OsRng) {
        Ok(_) => ExitCode::SUCCESS,
        // already reported on stdout by the session
        Err(_) => ExitCode::FAILURE,
    }
}

/// Everything that has to succeed before the first status event.
fn start(args: Args) -> Result<Session<SoftCard, SystemClock>> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(manifest) = args.manifest {
        config.manifest = manifest;
    }
    if let Some(hint) = args.token_hint {
        config.token_hint = hint;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.poll_interval_ms = interval;
    }
    if let Some(issuer) = args.issuer_cert {
        config.issuer_certificate = Some(issuer);
    }

    let key_der = fs::read(&args.card_key)
        .with_context(|| format!("failed to read {}", args.card_key.display()))?;
    let key = SigningKey::from_pkcs8_der(&key_der)
        .map_err(|err| anyhow::anyhow!("invalid card key: {err}"))?;
    let certificate = fs::read(&args.card_cert)
        .with_context(|| format!("failed to read {}", args.card_cert.display()))?;
    let card = SoftCard::new(key, certificate);

    let cancel = CancellationToken::new();
    let session = prepare(card, &config, SystemClock, cancel.clone())?;
    spawn_signal_watcher(cancel)?;
    Ok(session)
}

/// First Ctrl-C stops a bridge still waiting for a card, the second exits.
fn spawn_signal_watcher(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("failed to build signal runtime")?;
    thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::info!("interrupt received, cancelling card wait");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            })
        })
        .context("failed to spawn signal watcher")?;
    Ok(())
}
