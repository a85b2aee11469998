//! One-shot hybrid envelope: KEM encapsulation + derived-key AEAD.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::kdf::DEFAULT_HKDF_INFO;
use super::kem::{KemKeyPair, KemPublicKey};
use super::{EnvelopeError, aead, kdf};

/// The wire form of a sealed message: a KEM encapsulation plus the AEAD
/// payload sealed under the derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// KEM ciphertext (encapsulated shared secret).
    pub encapsulation: Vec<u8>,
    /// `IV ‖ CIPHERTEXT ‖ TAG` under the derived AEAD key.
    pub sealed: Vec<u8>,
}

impl Envelope {
    /// Binary framing: `u32_be(len(encapsulation)) ‖ encapsulation ‖
    /// sealed`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.encapsulation.len() + self.sealed.len());
        let len = u32::try_from(self.encapsulation.len()).unwrap_or(u32::MAX);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.encapsulation);
        out.extend_from_slice(&self.sealed);
        out
    }

    /// Parses the binary framing.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidEnvelope`] when the buffer is too
    /// short for the header or the declared encapsulation length overruns
    /// the buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < 4 {
            return Err(EnvelopeError::InvalidEnvelope {
                reason: format!("{} bytes is too short for the length header", bytes.len()),
            });
        }

        let mut header = [0u8; 4];
        header.copy_from_slice(&bytes[..4]);
        let kem_len = u32::from_be_bytes(header) as usize;

        let rest = &bytes[4..];
        if kem_len > rest.len() {
            return Err(EnvelopeError::InvalidEnvelope {
                reason: format!(
                    "declared encapsulation length {kem_len} overruns {} remaining bytes",
                    rest.len()
                ),
            });
        }

        Ok(Self {
            encapsulation: rest[..kem_len].to_vec(),
            sealed: rest[kem_len..].to_vec(),
        })
    }
}

/// Transport rendering of an [`Envelope`]: base64 fields plus a client
/// timestamp and an opaque optional nonce.
///
/// The nonce is declared for forward compatibility and ignored by the
/// verification core; replay protection belongs to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportEnvelope {
    /// Base64 KEM encapsulation.
    #[serde(rename = "encapsulatedKey")]
    pub encapsulated_key: String,
    /// Base64 `IV ‖ CIPHERTEXT ‖ TAG`.
    #[serde(rename = "encryptedPayload")]
    pub encrypted_payload: String,
    /// Client clock, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Opaque optional nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl TransportEnvelope {
    /// Wraps an envelope for transport, stamping the current time.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope, nonce: Option<String>) -> Self {
        Self {
            encapsulated_key: STANDARD.encode(&envelope.encapsulation),
            encrypted_payload: STANDARD.encode(&envelope.sealed),
            timestamp: Utc::now().timestamp_millis(),
            nonce,
        }
    }

    /// Decodes the base64 fields back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidEnvelope`] on undecodable base64.
    pub fn to_envelope(&self) -> Result<Envelope, EnvelopeError> {
        let encapsulation =
            STANDARD
                .decode(&self.encapsulated_key)
                .map_err(|e| EnvelopeError::InvalidEnvelope {
                    reason: format!("undecodable encapsulatedKey: {e}"),
                })?;
        let sealed =
            STANDARD
                .decode(&self.encrypted_payload)
                .map_err(|e| EnvelopeError::InvalidEnvelope {
                    reason: format!("undecodable encryptedPayload: {e}"),
                })?;
        Ok(Envelope {
            encapsulation,
            sealed,
        })
    }
}

/// Seals `plaintext` for the holder of `public_key` with the default
/// HKDF info string.
///
/// # Errors
///
/// Propagates encapsulation, derivation, and seal failures.
pub fn seal_for(public_key: &KemPublicKey, plaintext: &[u8]) -> Result<Envelope, EnvelopeError> {
    seal_for_with_info(public_key, plaintext, DEFAULT_HKDF_INFO)
}

/// Seals `plaintext` with an explicit HKDF info string.
///
/// The flow is encapsulate → derive → seal; the shared secret and the
/// derived key are dropped before returning.
///
/// # Errors
///
/// Propagates encapsulation, derivation, and seal failures.
pub fn seal_for_with_info(
    public_key: &KemPublicKey,
    plaintext: &[u8],
    info: &str,
) -> Result<Envelope, EnvelopeError> {
    let (encapsulation, shared_secret) = public_key.encapsulate()?;
    let key = kdf::derive_aead_key(shared_secret.as_slice(), None, info)?;
    let sealed = aead::seal(&key, plaintext)?;
    Ok(Envelope {
        encapsulation,
        sealed,
    })
}

/// Opens an envelope with the recipient keypair and the default HKDF
/// info string.
///
/// # Errors
///
/// Propagates decapsulation, derivation, and open failures.
pub fn open_with(keypair: &KemKeyPair, envelope: &Envelope) -> Result<Vec<u8>, EnvelopeError> {
    open_with_info(keypair, envelope, DEFAULT_HKDF_INFO)
}

/// Opens an envelope with an explicit HKDF info string.
///
/// # Errors
///
/// Propagates decapsulation, derivation, and open failures.
pub fn open_with_info(
    keypair: &KemKeyPair,
    envelope: &Envelope,
    info: &str,
) -> Result<Vec<u8>, EnvelopeError> {
    let shared_secret = keypair.decapsulate(&envelope.encapsulation)?;
    let key = kdf::derive_aead_key(shared_secret.as_slice(), None, info)?;
    aead::open(&key, &envelope.sealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ParameterSet;

    fn keypair() -> KemKeyPair {
        KemKeyPair::generate(ParameterSet::MlKem768).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let kp = keypair();
        let envelope = seal_for(kp.public_key(), b"integrity payload").unwrap();
        let opened = open_with(&kp, &envelope).unwrap();
        assert_eq!(opened, b"integrity payload");
    }

    #[test]
    fn round_trip_one_mebibyte() {
        let kp = keypair();
        let plaintext = vec![0x5Au8; 1 << 20];
        let envelope = seal_for(kp.public_key(), &plaintext).unwrap();
        assert_eq!(open_with(&kp, &envelope).unwrap(), plaintext);
    }

    #[test]
    fn independent_seals_differ() {
        let kp = keypair();
        let first = seal_for(kp.public_key(), b"same message").unwrap();
        let second = seal_for(kp.public_key(), b"same message").unwrap();
        assert_ne!(first.encapsulation, second.encapsulation);
        assert_ne!(first.sealed, second.sealed);
    }

    #[test]
    fn tampered_sealed_bytes_fail_authentication() {
        let kp = keypair();
        let mut envelope = seal_for(kp.public_key(), b"payload").unwrap();
        envelope.sealed[aead::IV_SIZE] ^= 0x01;
        let err = open_with(&kp, &envelope).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn mismatched_info_fails_authentication() {
        let kp = keypair();
        let envelope =
            seal_for_with_info(kp.public_key(), b"payload", "client-context").unwrap();
        let err = open_with_info(&kp, &envelope, "server-context").unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn envelope_for_wrong_keypair_fails() {
        let sender_target = keypair();
        let other = keypair();
        let envelope = seal_for(sender_target.public_key(), b"payload").unwrap();
        // Decapsulation is implicit-rejection: it yields a secret, but the
        // wrong one, so the AEAD open must fail authentication.
        let err = open_with(&other, &envelope).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn binary_framing_round_trip() {
        let kp = keypair();
        let envelope = seal_for(kp.public_key(), b"framed").unwrap();
        let bytes = envelope.to_bytes();
        let parsed = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn binary_framing_rejects_short_header() {
        let err = Envelope::from_bytes(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidEnvelope { .. }));
    }

    #[test]
    fn binary_framing_rejects_overrunning_length() {
        // Declares 1000 encapsulation bytes but carries 4.
        let mut bytes = 1000u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidEnvelope { .. }));
    }

    #[test]
    fn transport_round_trip() {
        let kp = keypair();
        let envelope = seal_for(kp.public_key(), b"transported").unwrap();
        let transport = TransportEnvelope::from_envelope(&envelope, Some("n-1".to_string()));

        let json = serde_json::to_string(&transport).unwrap();
        assert!(json.contains("\"encapsulatedKey\""));
        assert!(json.contains("\"encryptedPayload\""));
        assert!(json.contains("\"nonce\""));

        let parsed: TransportEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_envelope().unwrap(), envelope);
    }

    #[test]
    fn transport_elides_absent_nonce() {
        let kp = keypair();
        let envelope = seal_for(kp.public_key(), b"x").unwrap();
        let transport = TransportEnvelope::from_envelope(&envelope, None);
        let json = serde_json::to_string(&transport).unwrap();
        assert!(!json.contains("nonce"));
    }

    #[test]
    fn transport_rejects_bad_base64() {
        let transport = TransportEnvelope {
            encapsulated_key: "not//base64!!".to_string(),
            encrypted_payload: String::new(),
            timestamp: 0,
            nonce: None,
        };
        let err = transport.to_envelope().unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidEnvelope { .. }));
    }
}
