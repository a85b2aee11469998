//! The decrypted integrity payload and its admission rules.

use serde::{Deserialize, Serialize};

/// Required length of the hex fingerprint fields.
pub const FINGERPRINT_HEX_LEN: usize = 64;
/// Maximum accepted version string length.
pub const MAX_VERSION_LEN: usize = 50;
/// Maximum accepted variant string length.
pub const MAX_VARIANT_LEN: usize = 30;

/// The client's attestation, recovered from a sealed envelope.
///
/// Hex fields are case-insensitive on input and normalized to lowercase
/// by [`IntegrityPayload::validate`]. Unknown JSON fields (client
/// timestamps, device info) are tolerated and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityPayload {
    /// Client-computed Merkle root, 64 hex chars.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// Application version string.
    pub version: String,
    /// Build variant.
    pub variant: String,
    /// Signing-certificate fingerprint, 64 hex chars.
    #[serde(rename = "signerFingerprint")]
    pub signer_fingerprint: String,
}

/// A payload admission failure; the field name is safe to echo to the
/// client, the offending value is not echoed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadViolation {
    /// The field that failed admission.
    pub field: &'static str,
    /// Short reason, value-free.
    pub reason: &'static str,
}

impl IntegrityPayload {
    /// Validates the payload and normalizes hex fields to lowercase.
    ///
    /// Rules: both hex fields are exactly 64 hex chars; `version` is
    /// non-empty and at most 50 chars; `variant` is non-empty and at
    /// most 30 chars.
    ///
    /// # Errors
    ///
    /// Returns the first [`PayloadViolation`] encountered.
    pub fn validate(&mut self) -> Result<(), PayloadViolation> {
        if !is_hex_fingerprint(&self.merkle_root) {
            return Err(PayloadViolation {
                field: "merkleRoot",
                reason: "must be a 64-character hex string",
            });
        }
        if self.version.is_empty() {
            return Err(PayloadViolation {
                field: "version",
                reason: "must be non-empty",
            });
        }
        if self.version.chars().count() > MAX_VERSION_LEN {
            return Err(PayloadViolation {
                field: "version",
                reason: "exceeds maximum length",
            });
        }
        if self.variant.is_empty() {
            return Err(PayloadViolation {
                field: "variant",
                reason: "must be non-empty",
            });
        }
        if self.variant.chars().count() > MAX_VARIANT_LEN {
            return Err(PayloadViolation {
                field: "variant",
                reason: "exceeds maximum length",
            });
        }
        if !is_hex_fingerprint(&self.signer_fingerprint) {
            return Err(PayloadViolation {
                field: "signerFingerprint",
                reason: "must be a 64-character hex string",
            });
        }

        self.merkle_root.make_ascii_lowercase();
        self.signer_fingerprint.make_ascii_lowercase();
        Ok(())
    }
}

fn is_hex_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> IntegrityPayload {
        IntegrityPayload {
            merkle_root: "A1".repeat(32),
            version: "1.0.0".to_string(),
            variant: "release".to_string(),
            signer_fingerprint: "fe".repeat(32),
        }
    }

    #[test]
    fn valid_payload_passes_and_normalizes() {
        let mut payload = valid();
        payload.validate().unwrap();
        assert_eq!(payload.merkle_root, "a1".repeat(32));
    }

    #[test]
    fn short_merkle_root_rejected() {
        let mut payload = valid();
        payload.merkle_root = "abc123".to_string();
        let violation = payload.validate().unwrap_err();
        assert_eq!(violation.field, "merkleRoot");
    }

    #[test]
    fn non_hex_merkle_root_rejected() {
        let mut payload = valid();
        payload.merkle_root = "zz".repeat(32);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn empty_version_rejected() {
        let mut payload = valid();
        payload.version = String::new();
        assert_eq!(payload.validate().unwrap_err().field, "version");
    }

    #[test]
    fn oversized_version_rejected() {
        let mut payload = valid();
        payload.version = "v".repeat(MAX_VERSION_LEN + 1);
        assert_eq!(payload.validate().unwrap_err().field, "version");
    }

    #[test]
    fn oversized_variant_rejected() {
        let mut payload = valid();
        payload.variant = "x".repeat(MAX_VARIANT_LEN + 1);
        assert_eq!(payload.validate().unwrap_err().field, "variant");
    }

    #[test]
    fn bad_signer_fingerprint_rejected() {
        let mut payload = valid();
        payload.signer_fingerprint = "short".to_string();
        assert_eq!(payload.validate().unwrap_err().field, "signerFingerprint");
    }

    #[test]
    fn unknown_json_fields_tolerated() {
        let json = format!(
            r#"{{"merkleRoot":"{}","version":"1.0.0","variant":"release",
               "signerFingerprint":"{}","timestamp":123,"deviceInfo":{{"os":"android"}}}}"#,
            "ab".repeat(32),
            "cd".repeat(32)
        );
        let payload: IntegrityPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload.version, "1.0.0");
    }

    #[test]
    fn wire_field_names() {
        let json = serde_json::to_string(&valid()).unwrap();
        assert!(json.contains("\"merkleRoot\""));
        assert!(json.contains("\"signerFingerprint\""));
    }
}
