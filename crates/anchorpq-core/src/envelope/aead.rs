//! AES-256-GCM seal/open with the `IV ‖ CIPHERTEXT ‖ TAG` layout.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use tracing::warn;

use super::EnvelopeError;

/// IV (nonce) size in bytes.
pub const IV_SIZE: usize = 12;

/// Authentication tag size in bytes (128-bit tag).
pub const TAG_SIZE: usize = 16;

/// Seals `plaintext` under `key` with a fresh random IV.
///
/// Output layout: `IV (12) ‖ CIPHERTEXT ‖ TAG (16)`. Every call draws a
/// new IV from the CSPRNG; a `(key, IV)` pair is never reused because
/// keys are derived per envelope and the IV is random per seal.
///
/// # Errors
///
/// Returns [`EnvelopeError::EncryptionFailed`] if the cipher rejects the
/// operation.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| EnvelopeError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(IV_SIZE + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Opens a sealed payload produced by [`seal`].
///
/// # Errors
///
/// - [`EnvelopeError::InvalidCiphertext`] when the input is shorter than
///   `IV + TAG`.
/// - [`EnvelopeError::AuthenticationFailed`] when tag verification fails
///   (tampering, or a key derived from the wrong shared secret).
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if sealed.len() < IV_SIZE + TAG_SIZE {
        return Err(EnvelopeError::InvalidCiphertext { len: sealed.len() });
    }

    let (iv, ciphertext) = sealed.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher.decrypt(Nonce::from_slice(iv), ciphertext).map_err(|_| {
        // The AEAD reports one opaque failure; with a structurally valid
        // input that failure is tag verification.
        warn!("authentication tag verification failed - potential tampering");
        EnvelopeError::AuthenticationFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x24; 32];

    #[test]
    fn round_trip() {
        let sealed = seal(&KEY, b"attestation payload").unwrap();
        let opened = open(&KEY, &sealed).unwrap();
        assert_eq!(opened, b"attestation payload");
    }

    #[test]
    fn round_trip_empty_plaintext() {
        let sealed = seal(&KEY, b"").unwrap();
        assert_eq!(sealed.len(), IV_SIZE + TAG_SIZE);
        assert_eq!(open(&KEY, &sealed).unwrap(), b"");
    }

    #[test]
    fn round_trip_one_mebibyte() {
        let plaintext = vec![0xA5u8; 1 << 20];
        let sealed = seal(&KEY, &plaintext).unwrap();
        assert_eq!(open(&KEY, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn sealed_layout_has_iv_and_tag_overhead() {
        let sealed = seal(&KEY, b"xyz").unwrap();
        assert_eq!(sealed.len(), IV_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn fresh_iv_per_seal() {
        let first = seal(&KEY, b"same input").unwrap();
        let second = seal(&KEY, b"same input").unwrap();
        assert_ne!(first[..IV_SIZE], second[..IV_SIZE]);
        assert_ne!(first, second);
    }

    #[test]
    fn every_flipped_bit_fails_authentication() {
        let sealed = seal(&KEY, b"short").unwrap();
        for byte_index in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte_index] ^= 1 << bit;
                let err = open(&KEY, &tampered).unwrap_err();
                assert!(
                    matches!(err, EnvelopeError::AuthenticationFailed),
                    "flip at byte {byte_index} bit {bit} gave {err:?}"
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = seal(&KEY, b"payload").unwrap();
        let wrong = [0x25u8; 32];
        let err = open(&wrong, &sealed).unwrap_err();
        assert!(matches!(err, EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn too_short_input_is_invalid_ciphertext() {
        let err = open(&KEY, &[0u8; IV_SIZE + TAG_SIZE - 1]).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::InvalidCiphertext {
                len
            } if len == IV_SIZE + TAG_SIZE - 1
        ));
    }
}
