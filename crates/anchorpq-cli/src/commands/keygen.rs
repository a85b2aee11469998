//! `anchorpq keygen` - operator keypair provisioning.

use std::fs;
use std::path::PathBuf;

use anchorpq_core::envelope::{KemKeyPair, ParameterSet, keystore};
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Args;

/// Keygen command arguments.
#[derive(Debug, Args)]
pub struct KeygenArgs {
    /// Parameter set (ML-KEM-512, ML-KEM-768, ML-KEM-1024).
    #[arg(long, default_value = "ML-KEM-768")]
    pub parameter_set: String,

    /// Keypair file to write (created with 0600 permissions).
    #[arg(long)]
    pub output: PathBuf,

    /// Optionally write the base64 SPKI public key here.
    #[arg(long)]
    pub public_out: Option<PathBuf>,
}

/// Generates and persists a keypair.
///
/// # Errors
///
/// Fails on an unknown parameter set or persistence failure.
pub fn run(args: &KeygenArgs) -> Result<()> {
    let Some(parameter_set) = ParameterSet::from_name(&args.parameter_set) else {
        bail!("unknown parameter set: {}", args.parameter_set);
    };

    let keypair = KemKeyPair::generate(parameter_set).context("keypair generation failed")?;
    keystore::persist(&keypair, &args.output)
        .with_context(|| format!("failed to persist keypair to {}", args.output.display()))?;

    if let Some(public_out) = &args.public_out {
        let spki_b64 = STANDARD.encode(keypair.public_key().to_spki_der());
        fs::write(public_out, format!("{spki_b64}\n"))
            .with_context(|| format!("failed to write {}", public_out.display()))?;
    }

    println!("{}", keypair.key_id());
    Ok(())
}
