//! Integrity metadata emitted alongside the Merkle root.

use serde::{Deserialize, Serialize};

/// Name advertised in the `plugin` block of emitted metadata.
pub const PLUGIN_NAME: &str = "AnchorPQ Integrity Plugin";

/// Identity of the tool that produced a metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Human-readable tool name.
    pub name: String,
    /// Tool version.
    #[serde(rename = "pluginVersion")]
    pub plugin_version: String,
}

impl Default for PluginInfo {
    fn default() -> Self {
        Self {
            name: PLUGIN_NAME.to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The integrity metadata record written at build time.
///
/// Serialized as JSON (`integrity.json`) and as an XML rendering with
/// identical element names and values (`integrity.xml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityMetadata {
    /// Application version string.
    pub version: String,
    /// Build variant (for example `release` or `debug`).
    pub variant: String,
    /// Digest family used for leaf and node hashing.
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: String,
    /// Lowercase hex Merkle root.
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// ISO-8601 UTC timestamp of metadata generation.
    ///
    /// Informational only; the timestamp never influences the root.
    pub timestamp: String,
    /// Number of leaves in the tree.
    #[serde(rename = "leafCount")]
    pub leaf_count: usize,
    /// Optional signing-certificate fingerprint (64 hex chars).
    #[serde(rename = "signerFingerprint", skip_serializing_if = "Option::is_none")]
    pub signer_fingerprint: Option<String>,
    /// Producing tool identity.
    pub plugin: PluginInfo,
}

impl IntegrityMetadata {
    /// Pretty-printed JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns a serialization error only if JSON encoding itself fails,
    /// which would indicate a bug in the type definitions.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// XML rendering with the same element names and values as the JSON
    /// document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<integrity>\n");
        push_element(&mut xml, 1, "version", &self.version);
        push_element(&mut xml, 1, "variant", &self.variant);
        push_element(&mut xml, 1, "hashAlgorithm", &self.hash_algorithm);
        push_element(&mut xml, 1, "merkleRoot", &self.merkle_root);
        push_element(&mut xml, 1, "timestamp", &self.timestamp);
        push_element(&mut xml, 1, "leafCount", &self.leaf_count.to_string());
        if let Some(fingerprint) = &self.signer_fingerprint {
            push_element(&mut xml, 1, "signerFingerprint", fingerprint);
        }
        xml.push_str("  <plugin>\n");
        push_element(&mut xml, 2, "name", &self.plugin.name);
        push_element(&mut xml, 2, "pluginVersion", &self.plugin.plugin_version);
        xml.push_str("  </plugin>\n");
        xml.push_str("</integrity>\n");
        xml
    }
}

fn push_element(out: &mut String, depth: usize, name: &str, value: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&escape_xml(value));
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntegrityMetadata {
        IntegrityMetadata {
            version: "1.0.0".to_string(),
            variant: "release".to_string(),
            hash_algorithm: "SHA-256".to_string(),
            merkle_root: "ab".repeat(32),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            leaf_count: 42,
            signer_fingerprint: Some("fe".repeat(32)),
            plugin: PluginInfo::default(),
        }
    }

    #[test]
    fn json_uses_wire_field_names() {
        let json = sample().to_json_pretty().unwrap();
        assert!(json.contains("\"hashAlgorithm\""));
        assert!(json.contains("\"merkleRoot\""));
        assert!(json.contains("\"leafCount\""));
        assert!(json.contains("\"signerFingerprint\""));
        assert!(json.contains("\"pluginVersion\""));
    }

    #[test]
    fn json_elides_absent_signer_fingerprint() {
        let mut metadata = sample();
        metadata.signer_fingerprint = None;
        let json = metadata.to_json_pretty().unwrap();
        assert!(!json.contains("signerFingerprint"));
    }

    #[test]
    fn json_round_trips() {
        let metadata = sample();
        let json = metadata.to_json_pretty().unwrap();
        let parsed: IntegrityMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn xml_mirrors_json_fields() {
        let xml = sample().to_xml();
        assert!(xml.contains("<hashAlgorithm>SHA-256</hashAlgorithm>"));
        assert!(xml.contains("<leafCount>42</leafCount>"));
        assert!(xml.contains("<pluginVersion>"));
        assert!(xml.starts_with("<?xml version=\"1.0\""));
    }

    #[test]
    fn xml_escapes_special_characters() {
        let mut metadata = sample();
        metadata.variant = "a<b&\"c\"".to_string();
        let xml = metadata.to_xml();
        assert!(xml.contains("<variant>a&lt;b&amp;&quot;c&quot;</variant>"));
    }
}
