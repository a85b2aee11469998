//! Integrity verification core.
//!
//! Decodes client attestations, looks up the canonical record for the
//! `(version, variant)` key, compares fingerprints in constant time, and
//! emits a tri-state decision. Storage sits behind
//! [`RecordRepository`]; the core holds no mutable state across
//! requests.

mod payload;
mod record;
mod repository;
mod verifier;

pub use payload::{
    FINGERPRINT_HEX_LEN, IntegrityPayload, MAX_VARIANT_LEN, MAX_VERSION_LEN, PayloadViolation,
};
pub use record::CanonicalRecord;
pub use repository::{InMemoryRepository, RecordRepository, RepositoryError};
pub use verifier::{
    ERR_INTERNAL, ERR_INVALID_REQUEST, ERR_MERKLE_MISMATCH, ERR_UNKNOWN_VERSION, IntegrityVerifier,
    VerificationDecision, VerificationStatus,
};
