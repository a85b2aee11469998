//! Canonical integrity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authoritative integrity tuple held for a `(version, variant)`
/// release.
///
/// Records are uniquely keyed by `(version, variant)` among active
/// records. Deactivation is logical: `active` flips to `false`, the row
/// survives for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Application version string.
    pub version: String,
    /// Build variant.
    pub variant: String,
    /// Canonical Merkle root, lowercase hex.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// Canonical signer fingerprint, lowercase hex.
    #[serde(rename = "signerFingerprint")]
    pub signer_fingerprint: String,
    /// Optional operator note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this record participates in verification.
    pub active: bool,
    /// Creation time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl CanonicalRecord {
    /// Builds a new active record, normalizing hex fields to lowercase.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        variant: impl Into<String>,
        merkle_root: &str,
        signer_fingerprint: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: version.into(),
            variant: variant.into(),
            merkle_root: merkle_root.to_ascii_lowercase(),
            signer_fingerprint: signer_fingerprint.to_ascii_lowercase(),
            description: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the operator note.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_normalizes_hex_to_lowercase() {
        let record = CanonicalRecord::new("1.0.0", "release", &"AB".repeat(32), &"FE".repeat(32));
        assert_eq!(record.merkle_root, "ab".repeat(32));
        assert_eq!(record.signer_fingerprint, "fe".repeat(32));
        assert!(record.active);
    }

    #[test]
    fn serialization_uses_wire_names() {
        let record = CanonicalRecord::new("1.0.0", "release", "ab", "cd")
            .with_description("first release");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"merkleRoot\""));
        assert!(json.contains("\"signerFingerprint\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"description\""));
    }
}
