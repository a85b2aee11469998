//! `anchorpq fingerprint` - build-time Merkle fingerprinting.

use std::path::PathBuf;

use anchorpq_core::fingerprint::{self, FingerprintOptions};
use anchorpq_core::merkle::HashAlgorithm;
use anyhow::{Context, Result};
use clap::Args;

/// Fingerprint command arguments.
#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// Directory containing compiled .class files.
    #[arg(long)]
    pub classes_dir: PathBuf,

    /// Directory the outputs are written into.
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Application version recorded in metadata.
    #[arg(long)]
    pub version: String,

    /// Build variant (e.g. "release", "debug").
    #[arg(long)]
    pub variant: String,

    /// Hash algorithm (SHA-256, SHA-384, SHA-512, SHA3-256, SHA3-512).
    #[arg(long, default_value = "SHA-256")]
    pub algorithm: String,

    /// Signer certificate fingerprint to record in metadata (64 hex chars).
    #[arg(long)]
    pub signer_fingerprint: Option<String>,

    /// Extra exclusion pattern (regex over file names); repeatable.
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,
}

/// Runs the fingerprinter and prints the root to stdout.
///
/// # Errors
///
/// Fails on an unsupported algorithm or any fingerprinter error.
pub fn run(args: &FingerprintArgs) -> Result<()> {
    let algorithm = HashAlgorithm::from_name(&args.algorithm)
        .with_context(|| format!("unsupported hash algorithm: {}", args.algorithm))?;

    let outcome = fingerprint::generate(&FingerprintOptions {
        classes_root: args.classes_dir.clone(),
        output_dir: args.output_dir.clone(),
        version: args.version.clone(),
        variant: args.variant.clone(),
        algorithm,
        signer_fingerprint: args.signer_fingerprint.clone(),
        extra_excludes: args.excludes.clone(),
    })
    .context("fingerprinting failed")?;

    println!("{}", outcome.root_hex);
    Ok(())
}
