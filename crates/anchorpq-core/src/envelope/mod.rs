//! Hybrid post-quantum envelope.
//!
//! A one-shot confidential channel built from ML-KEM (CRYSTALS-Kyber)
//! key encapsulation, HKDF-SHA3-256 key derivation, and AES-256-GCM
//! authenticated encryption:
//!
//! - **Sender**: [`seal_for`] encapsulates against the recipient's public
//!   key, derives a fresh AEAD key from the shared secret, and seals the
//!   plaintext. The result is an [`Envelope`].
//! - **Recipient**: [`open_with`] decapsulates with the private key,
//!   re-derives the same AEAD key, and opens the sealed payload.
//!
//! The shared secret is never used directly as an AEAD key; it always
//! passes through HKDF. AEAD keys are derived per envelope and discarded
//! after use. The decapsulation key never leaves this module.
//!
//! Every failure surfaces as a typed [`EnvelopeError`] carrying a stable
//! `CRYPTO_*` code for the wire.

mod aead;
mod hybrid;
mod kdf;
mod kem;
pub mod keystore;

use thiserror::Error;

pub use aead::{IV_SIZE, TAG_SIZE, open, seal};
pub use hybrid::{
    Envelope, TransportEnvelope, open_with, open_with_info, seal_for, seal_for_with_info,
};
pub use kdf::{AEAD_KEY_SIZE, DEFAULT_HKDF_INFO, derive_aead_key};
pub use kem::{KemKeyPair, KemPublicKey, ParameterSet, PublicKeyResponse, SharedSecret};

/// Errors from the envelope subsystem.
///
/// Each variant maps to a stable wire code via [`EnvelopeError::code`];
/// the codes are part of the external contract and never change meaning.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Keypair generation failed.
    #[error("failed to generate ML-KEM keypair: {reason}")]
    KeyGenerationFailed {
        /// Failure detail.
        reason: String,
    },

    /// Encapsulation against a public key failed.
    #[error("failed to encapsulate shared secret")]
    EncapsulationFailed,

    /// Decapsulation of a client-provided encapsulation failed.
    #[error("failed to decapsulate shared secret: {reason}")]
    DecapsulationFailed {
        /// Failure detail. Never includes key material.
        reason: String,
    },

    /// HKDF key derivation failed.
    #[error("failed to derive encryption key")]
    KeyDerivationFailed,

    /// AEAD encryption failed.
    #[error("failed to encrypt payload")]
    EncryptionFailed,

    /// AEAD decryption failed for a reason other than tag verification.
    #[error("failed to decrypt payload: {reason}")]
    DecryptionFailed {
        /// Failure detail.
        reason: String,
    },

    /// Sealed input is structurally invalid (too short to hold IV + tag).
    #[error("invalid ciphertext: {len} bytes is shorter than IV + tag")]
    InvalidCiphertext {
        /// Length of the rejected input.
        len: usize,
    },

    /// The authentication tag did not verify. Potential tampering.
    #[error("authentication tag verification failed")]
    AuthenticationFailed,

    /// A public key failed structural or parameter validation.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey {
        /// Failure detail.
        reason: String,
    },

    /// A private key failed structural validation.
    #[error("invalid private key: {reason}")]
    InvalidPrivateKey {
        /// Failure detail. Never includes key material.
        reason: String,
    },

    /// A persisted keypair could not be loaded.
    #[error("failed to load keypair from {path}: {reason}")]
    KeyLoadFailed {
        /// Key file path.
        path: String,
        /// Failure detail.
        reason: String,
    },

    /// A keypair could not be persisted.
    #[error("failed to save keypair to {path}: {reason}")]
    KeySaveFailed {
        /// Key file path.
        path: String,
        /// Failure detail.
        reason: String,
    },

    /// Envelope framing is malformed (bad length prefix, truncation,
    /// undecodable base64).
    #[error("invalid envelope: {reason}")]
    InvalidEnvelope {
        /// Failure detail.
        reason: String,
    },
}

impl EnvelopeError {
    /// Stable wire code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::KeyGenerationFailed { .. } => "CRYPTO_001",
            Self::EncapsulationFailed => "CRYPTO_002",
            Self::DecapsulationFailed { .. } => "CRYPTO_003",
            Self::KeyDerivationFailed => "CRYPTO_004",
            Self::EncryptionFailed => "CRYPTO_005",
            Self::DecryptionFailed { .. } => "CRYPTO_006",
            Self::InvalidCiphertext { .. } | Self::InvalidEnvelope { .. } => "CRYPTO_007",
            Self::AuthenticationFailed => "CRYPTO_008",
            Self::InvalidPublicKey { .. } => "CRYPTO_009",
            Self::InvalidPrivateKey { .. } | Self::KeyLoadFailed { .. } => "CRYPTO_011",
            Self::KeySaveFailed { .. } => "CRYPTO_012",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            EnvelopeError::KeyGenerationFailed {
                reason: String::new()
            }
            .code(),
            "CRYPTO_001"
        );
        assert_eq!(EnvelopeError::EncapsulationFailed.code(), "CRYPTO_002");
        assert_eq!(
            EnvelopeError::DecapsulationFailed {
                reason: String::new()
            }
            .code(),
            "CRYPTO_003"
        );
        assert_eq!(EnvelopeError::KeyDerivationFailed.code(), "CRYPTO_004");
        assert_eq!(EnvelopeError::EncryptionFailed.code(), "CRYPTO_005");
        assert_eq!(EnvelopeError::InvalidCiphertext { len: 0 }.code(), "CRYPTO_007");
        assert_eq!(EnvelopeError::AuthenticationFailed.code(), "CRYPTO_008");
        assert_eq!(
            EnvelopeError::InvalidPublicKey {
                reason: String::new()
            }
            .code(),
            "CRYPTO_009"
        );
    }
}
