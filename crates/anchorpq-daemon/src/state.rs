//! Process-wide server state.
//!
//! The keypair and repository handle are initialized exactly once via
//! [`ServerState::init`] and are immutable afterwards; handlers share
//! the state through an `Arc` and never mutate it. There is no lazy
//! re-initialization path.

use std::sync::Arc;

use anchorpq_core::config::CryptoConfig;
use anchorpq_core::envelope::{
    self, KemKeyPair, PublicKeyResponse, TransportEnvelope, keystore,
};
use anchorpq_core::verify::{
    ERR_INVALID_REQUEST, IntegrityPayload, IntegrityVerifier, RecordRepository,
    VerificationDecision,
};
use anyhow::Context;
use tracing::{info, warn};

/// Immutable state shared by all request handlers.
pub struct ServerState {
    keypair: KemKeyPair,
    hkdf_info: String,
    verifier: IntegrityVerifier,
}

impl ServerState {
    /// One-time initialization: resolves the keypair (load, or generate
    /// and best-effort persist) and wires the verifier to the
    /// repository.
    ///
    /// # Errors
    ///
    /// Fails when key generation fails or a loaded key's parameter set
    /// disagrees with configuration (an operator error this server does
    /// not paper over).
    pub fn init(
        config: &CryptoConfig,
        repository: Arc<dyn RecordRepository>,
    ) -> anyhow::Result<Arc<Self>> {
        let parameter_set = config.kem.resolve_parameter_set();

        let keypair = match &config.kem.key_file_path {
            Some(path) => match keystore::load(path) {
                Ok(loaded) => {
                    if loaded.parameter_set() != parameter_set {
                        anyhow::bail!(
                            "key file {} holds a {} keypair but configuration requests {}",
                            path.display(),
                            loaded.parameter_set(),
                            parameter_set
                        );
                    }
                    loaded
                },
                Err(e) => {
                    warn!(error = %e, "failed to load keys from file, generating new keys");
                    let generated = KemKeyPair::generate(parameter_set)
                        .context("ML-KEM keypair generation failed")?;
                    if let Err(e) = keystore::persist(&generated, path) {
                        warn!(error = %e, "failed to persist generated keypair");
                    }
                    generated
                },
            },
            None => KemKeyPair::generate(parameter_set)
                .context("ML-KEM keypair generation failed")?,
        };

        info!(
            parameter_set = %keypair.parameter_set(),
            key_id = %keypair.key_id(),
            "verification service keys ready"
        );

        Ok(Arc::new(Self {
            keypair,
            hkdf_info: config.hkdf.info.clone(),
            verifier: IntegrityVerifier::new(repository),
        }))
    }

    /// The public-key distribution document for this process.
    #[must_use]
    pub fn public_key_response(&self) -> PublicKeyResponse {
        PublicKeyResponse::for_keypair(&self.keypair)
    }

    /// The verifier over the canonical-record repository.
    #[must_use]
    pub const fn verifier(&self) -> &IntegrityVerifier {
        &self.verifier
    }

    /// Runs the complete verification flow for one transport request:
    /// decapsulate, derive, open, parse, decide.
    ///
    /// Envelope-layer failures reject with their `CRYPTO_*` code and
    /// never touch the repository. The request `nonce` is ignored.
    #[must_use]
    pub fn handle_verification(&self, request: &TransportEnvelope) -> VerificationDecision {
        let envelope = match request.to_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(code = e.code(), "verification request failed envelope decode");
                return VerificationDecision::rejected("Cryptographic verification failed", e.code());
            },
        };

        let plaintext = match envelope::open_with_info(&self.keypair, &envelope, &self.hkdf_info) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(code = e.code(), "verification request failed to open");
                return VerificationDecision::rejected("Cryptographic verification failed", e.code());
            },
        };

        let payload: IntegrityPayload = match serde_json::from_slice(&plaintext) {
            Ok(payload) => payload,
            Err(_) => {
                warn!("sealed payload is not a valid integrity payload");
                return VerificationDecision::rejected(
                    "Invalid request: undecodable integrity payload",
                    ERR_INVALID_REQUEST,
                );
            },
        };

        self.verifier.verify(payload)
    }
}
