//! `anchorpq attest` - client-side one-shot attestation sealing.
//!
//! Builds the integrity payload from build metadata, imports the
//! server's distributed public key, seals the hybrid envelope, and
//! writes the transport-form verification request. Delivering the
//! request to the server is left to the surrounding transport.

use std::fs;
use std::path::PathBuf;

use anchorpq_core::envelope::{self, PublicKeyResponse, TransportEnvelope};
use anchorpq_core::fingerprint::IntegrityMetadata;
use anchorpq_core::verify::IntegrityPayload;
use anyhow::{Context, Result, bail};
use clap::Args;

/// Attest command arguments.
#[derive(Debug, Args)]
pub struct AttestArgs {
    /// Path to the integrity.json written by `fingerprint`.
    #[arg(long)]
    pub metadata: PathBuf,

    /// Path to the server's public-key response JSON.
    #[arg(long)]
    pub public_key: PathBuf,

    /// Signer fingerprint override (64 hex chars); required when the
    /// metadata carries none.
    #[arg(long)]
    pub signer_fingerprint: Option<String>,

    /// Opaque nonce to attach to the request.
    #[arg(long)]
    pub nonce: Option<String>,

    /// Write the request here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Seals the verification request.
///
/// # Errors
///
/// Fails on unreadable inputs, a missing signer fingerprint, an invalid
/// public key, or a sealing failure.
pub fn run(args: &AttestArgs) -> Result<()> {
    let metadata: IntegrityMetadata = serde_json::from_str(
        &fs::read_to_string(&args.metadata)
            .with_context(|| format!("failed to read {}", args.metadata.display()))?,
    )
    .context("malformed integrity metadata")?;

    let response: PublicKeyResponse = serde_json::from_str(
        &fs::read_to_string(&args.public_key)
            .with_context(|| format!("failed to read {}", args.public_key.display()))?,
    )
    .context("malformed public-key response")?;

    let signer_fingerprint = args
        .signer_fingerprint
        .clone()
        .or_else(|| metadata.signer_fingerprint.clone());
    let Some(signer_fingerprint) = signer_fingerprint else {
        bail!("metadata carries no signer fingerprint; pass --signer-fingerprint");
    };

    let mut payload = IntegrityPayload {
        merkle_root: metadata.merkle_root,
        version: metadata.version,
        variant: metadata.variant,
        signer_fingerprint,
    };
    if let Err(violation) = payload.validate() {
        bail!("invalid payload: {} {}", violation.field, violation.reason);
    }

    let public_key = response
        .import()
        .context("server public key failed to import")?;

    let plaintext = serde_json::to_vec(&payload).context("payload serialization failed")?;
    let sealed = envelope::seal_for(&public_key, &plaintext).context("sealing failed")?;
    let request = TransportEnvelope::from_envelope(&sealed, args.nonce.clone());

    let json =
        serde_json::to_string_pretty(&request).context("request serialization failed")?;
    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
