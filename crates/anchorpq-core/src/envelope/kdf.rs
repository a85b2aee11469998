//! AEAD key derivation from KEM shared secrets.
//!
//! HKDF over SHA3-256. When no salt is supplied the extract phase is
//! skipped and the shared secret is used directly as the pseudo-random
//! key; the expand phase always runs with the domain-separating info
//! string. Derivation is deterministic over `(secret, salt, info)`.

use hkdf::Hkdf;
use sha3::Sha3_256;
use zeroize::Zeroizing;

use super::EnvelopeError;

/// Default HKDF info string. Part of the wire contract: both peers must
/// derive with the same value or every open fails authentication.
pub const DEFAULT_HKDF_INFO: &str = "AnchorPQ-v1-IntegrityVerification";

/// Derived AEAD key size in bytes (AES-256).
pub const AEAD_KEY_SIZE: usize = 32;

/// Derives a 32-byte AEAD key from a KEM shared secret.
///
/// # Errors
///
/// Returns [`EnvelopeError::KeyDerivationFailed`] when the secret is too
/// short to serve as a pseudo-random key or expansion fails.
pub fn derive_aead_key(
    shared_secret: &[u8],
    salt: Option<&[u8]>,
    info: &str,
) -> Result<Zeroizing<[u8; AEAD_KEY_SIZE]>, EnvelopeError> {
    let hkdf = match salt {
        Some(salt) => Hkdf::<Sha3_256>::new(Some(salt), shared_secret),
        None => {
            Hkdf::<Sha3_256>::from_prk(shared_secret).map_err(|_| EnvelopeError::KeyDerivationFailed)?
        },
    };

    let mut key = Zeroizing::new([0u8; AEAD_KEY_SIZE]);
    hkdf.expand(info.as_bytes(), key.as_mut())
        .map_err(|_| EnvelopeError::KeyDerivationFailed)?;
    Ok(key)
}
