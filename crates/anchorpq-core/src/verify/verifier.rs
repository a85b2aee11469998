//! The verification decision engine.
//!
//! Each request walks received → looked-up → compared → decided.
//! Precedence is fixed: an invalid payload beats everything; an unknown
//! `(version, variant)` beats a Merkle mismatch (the server never reveals
//! whether an unknown version's root would have matched); a Merkle
//! mismatch beats a signer mismatch. Fingerprint comparisons are
//! constant-time over lowercase-normalized hex.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::payload::IntegrityPayload;
use super::record::CanonicalRecord;
use super::repository::{RecordRepository, RepositoryError};
use crate::merkle::constant_time_equals;

/// Rejection code: payload failed admission.
pub const ERR_INVALID_REQUEST: &str = "ERR_INVALID_REQUEST";
/// Rejection code: no active canonical record for `(version, variant)`.
pub const ERR_UNKNOWN_VERSION: &str = "ERR_UNKNOWN_VERSION";
/// Rejection code: Merkle root does not match the canonical record.
pub const ERR_MERKLE_MISMATCH: &str = "ERR_MERKLE_MISMATCH";
/// Rejection code: backend failure; detail is never exposed.
pub const ERR_INTERNAL: &str = "ERR_INTERNAL";

/// The tri-state verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    /// Both fingerprints match the canonical record.
    Approved,
    /// Merkle root matches but the signer fingerprint does not; a policy
    /// downgrade, not a rejection.
    Restricted,
    /// Verification failed; `error_code` names the cause.
    Rejected,
}

/// A verification decision as returned to the transport.
///
/// `error_code` is present exactly when the status is `REJECTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDecision {
    /// Outcome.
    pub status: VerificationStatus,
    /// Human-readable explanation.
    pub message: String,
    /// Server time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Stable rejection code, only on `REJECTED`.
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl VerificationDecision {
    /// An `APPROVED` decision.
    #[must_use]
    pub fn approved(message: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Approved,
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
            error_code: None,
        }
    }

    /// A `RESTRICTED` decision. Carries no error code.
    #[must_use]
    pub fn restricted(message: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Restricted,
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
            error_code: None,
        }
    }

    /// A `REJECTED` decision with its stable error code.
    #[must_use]
    pub fn rejected(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Rejected,
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
            error_code: Some(error_code.into()),
        }
    }
}

/// Verifies integrity payloads against the canonical-record repository.
///
/// Stateless across requests: every verify re-fetches its record, so a
/// verify that follows a successful `save_or_update` observes the new
/// record.
pub struct IntegrityVerifier {
    repository: Arc<dyn RecordRepository>,
}

impl IntegrityVerifier {
    /// Creates a verifier over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn RecordRepository>) -> Self {
        Self { repository }
    }

    /// Runs the full decision state machine for one payload.
    pub fn verify(&self, mut payload: IntegrityPayload) -> VerificationDecision {
        // Received: admission.
        if let Err(violation) = payload.validate() {
            warn!(
                field = violation.field,
                reason = violation.reason,
                "rejecting malformed integrity payload"
            );
            return VerificationDecision::rejected(
                format!("Invalid request: {} {}", violation.field, violation.reason),
                ERR_INVALID_REQUEST,
            );
        }

        info!(
            version = %payload.version,
            variant = %payload.variant,
            "verifying integrity"
        );

        // Looked-up: canonical record fetch.
        let record = match self
            .repository
            .find_active(&payload.version, &payload.variant)
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(
                    version = %payload.version,
                    variant = %payload.variant,
                    "no canonical record"
                );
                return VerificationDecision::rejected(
                    "Unknown application version or variant",
                    ERR_UNKNOWN_VERSION,
                );
            },
            Err(RepositoryError { message }) => {
                // Backend detail stays server-side.
                error!(detail = %message, "repository failure during verification");
                return VerificationDecision::rejected("Internal server error", ERR_INTERNAL);
            },
        };

        // Compared: Merkle root first, then signer fingerprint.
        if !hex_fingerprints_match(&payload.merkle_root, &record.merkle_root) {
            warn!(
                version = %payload.version,
                variant = %payload.variant,
                "Merkle root mismatch"
            );
            return VerificationDecision::rejected(
                "Application integrity verification failed",
                ERR_MERKLE_MISMATCH,
            );
        }

        if !hex_fingerprints_match(&payload.signer_fingerprint, &record.signer_fingerprint) {
            warn!(
                version = %payload.version,
                variant = %payload.variant,
                "signer fingerprint mismatch"
            );
            return VerificationDecision::restricted(
                "Application signed with unknown certificate",
            );
        }

        info!(
            version = %payload.version,
            variant = %payload.variant,
            "integrity verification approved"
        );
        VerificationDecision::approved("Integrity verified successfully")
    }

    /// Whether an active record exists for `(version, variant)`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    pub fn is_known_version(&self, version: &str, variant: &str) -> Result<bool, RepositoryError> {
        Ok(self.repository.find_active(version, variant)?.is_some())
    }

    /// Registers (or updates) a canonical record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    pub fn register_record(
        &self,
        record: CanonicalRecord,
    ) -> Result<CanonicalRecord, RepositoryError> {
        info!(
            version = %record.version,
            variant = %record.variant,
            "registering integrity record"
        );
        self.repository.save_or_update(record)
    }

    /// Logically deletes the record for `(version, variant)`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    pub fn deactivate(&self, version: &str, variant: &str) -> Result<(), RepositoryError> {
        info!(version, variant, "deactivating integrity record");
        self.repository.deactivate(version, variant)
    }

    /// Fetches the active record for `(version, variant)`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    pub fn get_record(
        &self,
        version: &str,
        variant: &str,
    ) -> Result<Option<CanonicalRecord>, RepositoryError> {
        self.repository.find_active(version, variant)
    }
}

/// Constant-time comparison of two lowercase-normalized hex strings.
fn hex_fingerprints_match(payload_hex: &str, canonical_hex: &str) -> bool {
    let canonical = canonical_hex.to_ascii_lowercase();
    constant_time_equals(payload_hex.as_bytes(), canonical.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::repository::InMemoryRepository;

    const ROOT: &str = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";
    const SIGNER: &str = "fedcba0987654321fedcba0987654321fedcba0987654321fedcba09876543fe";

    fn verifier_with_record() -> IntegrityVerifier {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save_or_update(CanonicalRecord::new("1.0.0", "release", ROOT, SIGNER))
            .unwrap();
        IntegrityVerifier::new(repo)
    }

    fn payload() -> IntegrityPayload {
        IntegrityPayload {
            merkle_root: ROOT.to_string(),
            version: "1.0.0".to_string(),
            variant: "release".to_string(),
            signer_fingerprint: SIGNER.to_string(),
        }
    }

    #[test]
    fn exact_match_approved() {
        let decision = verifier_with_record().verify(payload());
        assert_eq!(decision.status, VerificationStatus::Approved);
        assert!(decision.error_code.is_none());
    }

    #[test]
    fn merkle_mismatch_rejected() {
        let mut p = payload();
        p.merkle_root = "0".repeat(64);
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.status, VerificationStatus::Rejected);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_MERKLE_MISMATCH));
    }

    #[test]
    fn signer_mismatch_restricted_without_code() {
        let mut p = payload();
        p.signer_fingerprint = "0".repeat(64);
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.status, VerificationStatus::Restricted);
        assert!(decision.error_code.is_none());
    }

    #[test]
    fn unknown_version_rejected() {
        let mut p = payload();
        p.version = "99.99.99".to_string();
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.status, VerificationStatus::Rejected);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_UNKNOWN_VERSION));
    }

    #[test]
    fn unknown_version_takes_precedence_over_mismatches() {
        let mut p = payload();
        p.version = "99.99.99".to_string();
        p.merkle_root = "0".repeat(64);
        p.signer_fingerprint = "0".repeat(64);
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_UNKNOWN_VERSION));
    }

    #[test]
    fn merkle_mismatch_takes_precedence_over_signer_mismatch() {
        let mut p = payload();
        p.merkle_root = "0".repeat(64);
        p.signer_fingerprint = "0".repeat(64);
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_MERKLE_MISMATCH));
    }

    #[test]
    fn uppercase_payload_hex_still_approved() {
        let mut p = payload();
        p.merkle_root = ROOT.to_ascii_uppercase();
        p.signer_fingerprint = SIGNER.to_ascii_uppercase();
        let decision = verifier_with_record().verify(p);
        assert_eq!(decision.status, VerificationStatus::Approved);
    }

    #[test]
    fn uppercase_canonical_hex_still_approved() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut record = CanonicalRecord::new("1.0.0", "release", ROOT, SIGNER);
        record.merkle_root = ROOT.to_ascii_uppercase();
        record.signer_fingerprint = SIGNER.to_ascii_uppercase();
        repo.save_or_update(record).unwrap();

        let decision = IntegrityVerifier::new(repo).verify(payload());
        assert_eq!(decision.status, VerificationStatus::Approved);
    }

    #[test]
    fn invalid_payload_rejected_before_lookup() {
        struct PanicRepository;
        impl RecordRepository for PanicRepository {
            fn find_active(
                &self,
                _: &str,
                _: &str,
            ) -> Result<Option<CanonicalRecord>, RepositoryError> {
                panic!("lookup must not run for invalid payloads");
            }
            fn save_or_update(
                &self,
                _: CanonicalRecord,
            ) -> Result<CanonicalRecord, RepositoryError> {
                unimplemented!()
            }
            fn deactivate(&self, _: &str, _: &str) -> Result<(), RepositoryError> {
                unimplemented!()
            }
        }

        let verifier = IntegrityVerifier::new(Arc::new(PanicRepository));
        let mut p = payload();
        p.merkle_root = "not-hex".to_string();
        let decision = verifier.verify(p);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_INVALID_REQUEST));
    }

    #[test]
    fn repository_failure_masked_as_internal() {
        struct FailingRepository;
        impl RecordRepository for FailingRepository {
            fn find_active(
                &self,
                _: &str,
                _: &str,
            ) -> Result<Option<CanonicalRecord>, RepositoryError> {
                Err(RepositoryError::new("connection refused to db-host:5432"))
            }
            fn save_or_update(
                &self,
                _: CanonicalRecord,
            ) -> Result<CanonicalRecord, RepositoryError> {
                unimplemented!()
            }
            fn deactivate(&self, _: &str, _: &str) -> Result<(), RepositoryError> {
                unimplemented!()
            }
        }

        let decision = IntegrityVerifier::new(Arc::new(FailingRepository)).verify(payload());
        assert_eq!(decision.status, VerificationStatus::Rejected);
        assert_eq!(decision.error_code.as_deref(), Some(ERR_INTERNAL));
        assert!(!decision.message.contains("db-host"));
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&VerificationDecision::approved("ok")).unwrap();
        assert!(json.contains("\"APPROVED\""));
        assert!(!json.contains("errorCode"));

        let json = serde_json::to_string(&VerificationDecision::rejected("no", ERR_INTERNAL)).unwrap();
        assert!(json.contains("\"REJECTED\""));
        assert!(json.contains("\"errorCode\":\"ERR_INTERNAL\""));
    }

    #[test]
    fn verify_observes_repository_updates() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save_or_update(CanonicalRecord::new("1.0.0", "release", ROOT, SIGNER))
            .unwrap();
        let verifier = IntegrityVerifier::new(Arc::clone(&repo) as Arc<dyn RecordRepository>);

        assert_eq!(
            verifier.verify(payload()).status,
            VerificationStatus::Approved
        );

        let new_root = "b".repeat(64);
        repo.save_or_update(CanonicalRecord::new("1.0.0", "release", &new_root, SIGNER))
            .unwrap();

        // No caching: the stale payload is now rejected.
        let decision = verifier.verify(payload());
        assert_eq!(decision.error_code.as_deref(), Some(ERR_MERKLE_MISMATCH));
    }
}
