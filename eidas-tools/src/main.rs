// eidas/eidas-tools/src/main.rs
// Numan Thabit 2025

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::OsRng;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eidas_circuit::CertificateProfile;
use eidas_common::{
    cert::profile_from_certificate, load_verifier_artifacts, write_atomic, ArtifactManifest,
    CircuitDescriptor, VerifierArtifacts, MANIFEST_FILE,
};
use eidas_prover::{setup_binding, setup_minimal, write_artifacts};
use eidas_verifier::export_solidity_verifier;

const DEFAULT_OUTPUT_DIR: &str = "artifacts";
const DEFAULT_MANIFEST_PATH: &str = "artifacts/manifest.json";

#[derive(Parser)]
#[command(name = "eidas-tools", about = "Utility commands for eIDAS binding artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Groth16 setup and write keys, descriptor and manifest.
    Setup(SetupArgs),
    /// Print metadata about vk.bin based on the manifest path.
    DumpVk(DumpArgs),
    /// Render the Solidity verifier for the key a manifest points at.
    ExportVerifier(ExportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    /// Challenge signature only; 32 public challenge bytes.
    Minimal,
    /// Challenge signature bound to a certificate subject.
    Binding,
}

#[derive(Args)]
struct SetupArgs {
    #[arg(long, value_enum, default_value_t = Kind::Binding)]
    kind: Kind,
    /// Output directory for artifacts.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Certificate profile as JSON. Defaults to the eIDAS card profile.
    #[arg(long, conflicts_with = "sample_cert")]
    profile: Option<PathBuf>,
    /// Derive the profile from a DER sample certificate instead.
    #[arg(long, requires = "subject")]
    sample_cert: Option<PathBuf>,
    /// Subject serial as it appears in the sample certificate.
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args)]
struct DumpArgs {
    #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,
    /// Write here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eidas_tools=info,eidas_prover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Setup(args) => setup(args),
        Commands::DumpVk(args) => dump_vk(args),
        Commands::ExportVerifier(args) => export_verifier(args),
    }
}

fn setup(args: SetupArgs) -> Result<()> {
    let (descriptor, params) = match args.kind {
        Kind::Minimal => {
            println!("Generating minimal circuit artifacts...");
            (CircuitDescriptor::minimal(), setup_minimal(&mut OsRng)?)
        }
        Kind::Binding => {
            let profile = resolve_profile(&args)?;
            println!(
                "Generating binding circuit artifacts (certificate {} bytes, TBS {} bytes)...",
                profile.cert_len, profile.tbs_len
            );
            (CircuitDescriptor::binding(profile.clone()), setup_binding(profile, &mut OsRng)?)
        }
    };
    println!("This may take several minutes...");

    let manifest = write_artifacts(
        &args.output_dir,
        &descriptor,
        &params,
        current_unix_timestamp(),
    )?;
    println!(
        "Generated {:?} artifacts for circuit v{} at {}",
        manifest.kind,
        manifest.circuit_version,
        args.output_dir.join(MANIFEST_FILE).display()
    );
    print_artifact_summary(&manifest);
    Ok(())
}

fn resolve_profile(args: &SetupArgs) -> Result<CertificateProfile> {
    if let Some(path) = &args.profile {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let profile: CertificateProfile =
            serde_json::from_slice(&bytes).context("failed to parse certificate profile")?;
        profile.validate()?;
        return Ok(profile);
    }
    if let (Some(path), Some(subject)) = (&args.sample_cert, &args.subject) {
        let der = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let profile = profile_from_certificate(&der, subject.as_bytes())
            .with_context(|| format!("failed to derive a profile from {}", path.display()))?;
        tracing::info!(?profile, "derived certificate profile");
        return Ok(profile);
    }
    Ok(CertificateProfile::eidas())
}

fn print_artifact_summary(manifest: &ArtifactManifest) {
    println!("\nArtifact Summary:");
    println!("  {}: {} bytes, blake3: {}", manifest.circuit.path, manifest.circuit.size, manifest.circuit.blake3);
    println!("  {}: {} bytes, blake3: {}", manifest.vk.path, manifest.vk.size, manifest.vk.blake3);
    println!("  {}: {} bytes, blake3: {}", manifest.pk.path, manifest.pk.size, manifest.pk.blake3);
    if let Some(contract) = &manifest.verifier_contract {
        println!("  {}: {} bytes, blake3: {}", contract.path, contract.size, contract.blake3);
    }
}

fn dump_vk(args: DumpArgs) -> Result<()> {
    let artifacts = load_artifacts(&args.manifest)?;
    let summary = VkSummary {
        manifest_path: args.manifest.display().to_string(),
        circuit_version: artifacts.manifest.circuit_version,
        manifest_version: artifacts.manifest.manifest_version,
        kind: format!("{:?}", artifacts.descriptor.kind),
        vk_hash: artifacts.manifest.vk.blake3.clone(),
        vk_size: artifacts.manifest.vk.size,
        public_inputs: artifacts.vk.gamma_abc_g1.len().saturating_sub(1),
        profile: artifacts.descriptor.profile,
    };
    output_summary(&summary, args.json)
}

fn export_verifier(args: ExportArgs) -> Result<()> {
    let artifacts = load_artifacts(&args.manifest)?;
    let contract = export_solidity_verifier(&artifacts.vk);
    match args.output {
        Some(path) => {
            write_atomic(&path, contract.as_bytes())?;
            println!("Wrote verifier contract to {}", path.display());
        }
        None => print!("{contract}"),
    }
    Ok(())
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn load_artifacts(path: &Path) -> Result<VerifierArtifacts> {
    load_verifier_artifacts(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))
}

fn output_summary<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

#[derive(Serialize)]
struct VkSummary {
    manifest_path: String,
    circuit_version: u32,
    manifest_version: u32,
    kind: String,
    vk_hash: String,
    vk_size: u64,
    public_inputs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<CertificateProfile>,
}

impl fmt::Display for VkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "manifest: {}", self.manifest_path)?;
        writeln!(f, "circuit_version: {}", self.circuit_version)?;
        writeln!(f, "manifest_version: {}", self.manifest_version)?;
        writeln!(f, "kind: {}", self.kind)?;
        writeln!(f, "vk_hash: {}", self.vk_hash)?;
        writeln!(f, "vk_size: {} bytes", self.vk_size)?;
        write!(f, "public inputs: {}", self.public_inputs)?;
        if let Some(profile) = &self.profile {
            write!(
                f,
                "\nprofile: tbs {} at {} / certificate {} bytes, subject at {}, key at {}, signature at {}",
                profile.tbs_len,
                profile.tbs.offset,
                profile.cert_len,
                profile.subject.offset,
                profile.subject_pubkey.offset,
                profile.signature.offset
            )?;
        }
        Ok(())
    }
}
