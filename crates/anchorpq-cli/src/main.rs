//! anchorpq - build-time fingerprinting and client attestation tooling.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// AnchorPQ integrity tooling.
#[derive(Parser, Debug)]
#[command(name = "anchorpq")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the Merkle fingerprint of a compiled classes directory.
    Fingerprint(commands::fingerprint::FingerprintArgs),

    /// Seal an integrity payload into a verification request.
    Attest(commands::attest::AttestArgs),

    /// Generate and persist an ML-KEM keypair.
    Keygen(commands::keygen::KeygenArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Fingerprint(args) => commands::fingerprint::run(&args),
        Commands::Attest(args) => commands::attest::run(&args),
        Commands::Keygen(args) => commands::keygen::run(&args),
    }
}
