//! Content hashing behind a small algorithm-dispatch API.
//!
//! All digests used for leaf hashing and tree combination go through
//! [`hash`] / [`hash_concat`] so that the algorithm choice stays a value,
//! not a type parameter, and can be carried in configuration and metadata.

use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Errors from the hash layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The named algorithm is not in the supported set.
    #[error("unsupported hash algorithm: {name}")]
    UnsupportedAlgorithm {
        /// The algorithm name as given by the caller.
        name: String,
    },
}

/// Supported digest families for leaf and node hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-256 (32-byte digests). The default.
    Sha256,
    /// SHA-384 (48-byte digests).
    Sha384,
    /// SHA-512 (64-byte digests).
    Sha512,
    /// SHA3-256 (32-byte digests).
    Sha3_256,
    /// SHA3-512 (64-byte digests).
    Sha3_512,
}

impl HashAlgorithm {
    /// Parses an algorithm name as it appears in configuration and
    /// metadata (`SHA-256`, `SHA3-512`, ...). Case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::UnsupportedAlgorithm`] for any name outside
    /// the supported set.
    pub fn from_name(name: &str) -> Result<Self, HashError> {
        match name.to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" => Ok(Self::Sha256),
            "SHA-384" | "SHA384" => Ok(Self::Sha384),
            "SHA-512" | "SHA512" => Ok(Self::Sha512),
            "SHA3-256" => Ok(Self::Sha3_256),
            "SHA3-512" => Ok(Self::Sha3_512),
            _ => Err(HashError::UnsupportedAlgorithm {
                name: name.to_string(),
            }),
        }
    }

    /// Returns the canonical name used in metadata output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Sha3_256 => "SHA3-256",
            Self::Sha3_512 => "SHA3-512",
        }
    }

    /// Digest width in bytes.
    #[must_use]
    pub const fn digest_size(self) -> usize {
        match self {
            Self::Sha256 | Self::Sha3_256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hashes `data` under `algorithm`.
#[must_use]
pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
        HashAlgorithm::Sha3_512 => Sha3_512::digest(data).to_vec(),
    }
}

/// Hashes the byte concatenation `left ‖ right` in a single digest pass.
///
/// No separator or length prefix is inserted; this is the Merkle node
/// combining rule.
#[must_use]
pub fn hash_concat(left: &[u8], right: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    fn concat_digest<D: Digest>(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut hasher = D::new();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().to_vec()
    }

    match algorithm {
        HashAlgorithm::Sha256 => concat_digest::<Sha256>(left, right),
        HashAlgorithm::Sha384 => concat_digest::<Sha384>(left, right),
        HashAlgorithm::Sha512 => concat_digest::<Sha512>(left, right),
        HashAlgorithm::Sha3_256 => concat_digest::<Sha3_256>(left, right),
        HashAlgorithm::Sha3_512 => concat_digest::<Sha3_512>(left, right),
    }
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn to_hex(digest: &[u8]) -> String {
    hex::encode(digest)
}

/// Constant-time byte equality.
///
/// A length mismatch returns `false` immediately; lengths of the values
/// compared here (digest widths, hex fingerprints) are public constants,
/// so the short-circuit leaks nothing.
#[must_use]
pub fn constant_time_equals(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}
