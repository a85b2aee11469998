//! # anchorpq-core
//!
//! Core library for AnchorPQ, an application-integrity attestation
//! system. A build binds its compiled output to a Merkle root; at
//! runtime the client seals that root inside a hybrid post-quantum
//! envelope, and the server validates it against a canonical record.
//!
//! ## Subsystems
//!
//! - **Merkle engine** ([`merkle`]): content hashing, deterministic tree
//!   construction, membership proofs.
//! - **Fingerprinter** ([`fingerprint`]): directory traversal, exclusion
//!   policy, metadata emission.
//! - **Envelope** ([`envelope`]): ML-KEM + HKDF-SHA3 + AES-256-GCM
//!   one-shot confidential channel.
//! - **Verifier** ([`verify`]): payload admission, canonical lookup,
//!   constant-time comparison, tri-state decisions.
//!
//! ## Example
//!
//! ```rust
//! use anchorpq_core::envelope::{self, KemKeyPair, ParameterSet};
//!
//! # fn main() -> Result<(), anchorpq_core::envelope::EnvelopeError> {
//! // Server side: generate a keypair once at startup.
//! let keypair = KemKeyPair::generate(ParameterSet::MlKem768)?;
//!
//! // Client side: seal a payload for the server.
//! let sealed = envelope::seal_for(keypair.public_key(), b"attestation")?;
//!
//! // Server side: open it.
//! let payload = envelope::open_with(&keypair, &sealed)?;
//! assert_eq!(payload, b"attestation");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod envelope;
pub mod fingerprint;
pub mod merkle;
pub mod verify;

pub use config::CryptoConfig;
pub use envelope::{Envelope, EnvelopeError, KemKeyPair, ParameterSet};
pub use merkle::{HashAlgorithm, MerkleTree};
pub use verify::{IntegrityPayload, IntegrityVerifier, VerificationDecision};
