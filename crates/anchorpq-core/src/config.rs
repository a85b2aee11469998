//! Crypto and fingerprint configuration.
//!
//! TOML sections `[kem]`, `[hkdf]`, `[aead]`, `[merkle]`, all optional,
//! all defaulted. Unsupported values for enumerated options fall back to
//! their defaults with a warning rather than refusing startup; the
//! parameter-set fallback in particular mirrors the lenient behavior the
//! wire contract documents.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::envelope::{DEFAULT_HKDF_INFO, ParameterSet};
use crate::merkle::HashAlgorithm;

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
}

/// KEM settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KemConfig {
    /// Parameter-set name; unknown values fall back to `ML-KEM-768`.
    pub parameter_set: String,
    /// Optional keypair persistence path.
    pub key_file_path: Option<PathBuf>,
}

impl Default for KemConfig {
    fn default() -> Self {
        Self {
            parameter_set: ParameterSet::MlKem768.wire_name().to_string(),
            key_file_path: None,
        }
    }
}

impl KemConfig {
    /// Resolves the configured parameter set, warning and defaulting on
    /// unknown names.
    #[must_use]
    pub fn resolve_parameter_set(&self) -> ParameterSet {
        ParameterSet::from_name_lossy(&self.parameter_set)
    }
}

/// HKDF settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HkdfConfig {
    /// Digest name; only `SHA3-256` is supported.
    pub digest: String,
    /// Domain-separating info string.
    pub info: String,
}

impl Default for HkdfConfig {
    fn default() -> Self {
        Self {
            digest: "SHA3-256".to_string(),
            info: DEFAULT_HKDF_INFO.to_string(),
        }
    }
}

/// AEAD settings. The supported cipher is fixed (AES-256-GCM); these
/// knobs exist to make the wire geometry explicit and to reject configs
/// this build cannot honor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AeadConfig {
    /// AEAD key size in bits.
    pub key_size_bits: u32,
    /// IV size in bytes.
    pub iv_size_bytes: u32,
    /// Authentication tag size in bits.
    pub tag_size_bits: u32,
}

impl Default for AeadConfig {
    fn default() -> Self {
        Self {
            key_size_bits: 256,
            iv_size_bytes: 12,
            tag_size_bits: 128,
        }
    }
}

/// Merkle fingerprint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MerkleConfig {
    /// Digest name for leaves and nodes.
    pub digest: String,
    /// Extra exclusion patterns, unioned with the defaults.
    pub exclude_patterns: Vec<String>,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            digest: HashAlgorithm::Sha256.name().to_string(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl MerkleConfig {
    /// Resolves the configured digest, warning and defaulting to SHA-256
    /// on unknown names.
    #[must_use]
    pub fn resolve_digest(&self) -> HashAlgorithm {
        HashAlgorithm::from_name(&self.digest).unwrap_or_else(|_| {
            warn!(digest = %self.digest, "unknown Merkle digest, defaulting to SHA-256");
            HashAlgorithm::Sha256
        })
    }
}

/// Top-level crypto configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// KEM settings.
    pub kem: KemConfig,
    /// HKDF settings.
    pub hkdf: HkdfConfig,
    /// AEAD settings.
    pub aead: AeadConfig,
    /// Merkle settings.
    pub merkle: MerkleConfig,
}

impl CryptoConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or does not
    /// parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Applies lenient fallbacks for enumerated options this build does
    /// not support, warning on each.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.hkdf.digest.eq_ignore_ascii_case("SHA3-256") {
            warn!(digest = %self.hkdf.digest, "unsupported HKDF digest, defaulting to SHA3-256");
            self.hkdf.digest = "SHA3-256".to_string();
        }
        let aead_default = AeadConfig::default();
        if self.aead.key_size_bits != aead_default.key_size_bits
            || self.aead.iv_size_bytes != aead_default.iv_size_bytes
            || self.aead.tag_size_bits != aead_default.tag_size_bits
        {
            warn!(
                key_size_bits = self.aead.key_size_bits,
                iv_size_bytes = self.aead.iv_size_bytes,
                tag_size_bits = self.aead.tag_size_bits,
                "unsupported AEAD geometry, defaulting to AES-256-GCM with 12-byte IV"
            );
            self.aead = aead_default;
        }
        self
    }
}
