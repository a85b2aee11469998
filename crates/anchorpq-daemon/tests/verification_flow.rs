//! End-to-end verification flow: a client seals an attestation against
//! the served public key, the server opens it and decides.

use std::sync::Arc;

use anchorpq_core::config::CryptoConfig;
use anchorpq_core::envelope::{self, TransportEnvelope};
use anchorpq_core::verify::{
    CanonicalRecord, IntegrityPayload, RecordRepository, VerificationStatus,
};
use anchorpq_daemon::repository::SqliteRecordRepository;
use anchorpq_daemon::state::ServerState;

const ROOT: &str = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";
const SIGNER: &str = "fedcba0987654321fedcba0987654321fedcba0987654321fedcba09876543fe";

fn server_with_canonical_record() -> Arc<ServerState> {
    let repository: Arc<dyn RecordRepository> =
        Arc::new(SqliteRecordRepository::open_in_memory().unwrap());
    repository
        .save_or_update(CanonicalRecord::new("1.0.0", "release", ROOT, SIGNER))
        .unwrap();
    ServerState::init(&CryptoConfig::default(), repository).unwrap()
}

fn payload() -> IntegrityPayload {
    IntegrityPayload {
        merkle_root: ROOT.to_string(),
        version: "1.0.0".to_string(),
        variant: "release".to_string(),
        signer_fingerprint: SIGNER.to_string(),
    }
}

/// Plays the client role: fetch the public key, seal the payload, build
/// the transport request.
fn seal_request(server: &ServerState, payload: &IntegrityPayload) -> TransportEnvelope {
    let public_key = server.public_key_response().import().unwrap();
    let plaintext = serde_json::to_vec(payload).unwrap();
    let sealed = envelope::seal_for(&public_key, &plaintext).unwrap();
    TransportEnvelope::from_envelope(&sealed, None)
}

#[test]
fn exact_match_is_approved() {
    let server = server_with_canonical_record();
    let request = seal_request(&server, &payload());

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Approved);
    assert!(decision.error_code.is_none());
}

#[test]
fn wrong_merkle_root_is_rejected() {
    let server = server_with_canonical_record();
    let mut p = payload();
    p.merkle_root = "0".repeat(64);
    let request = seal_request(&server, &p);

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Rejected);
    assert_eq!(decision.error_code.as_deref(), Some("ERR_MERKLE_MISMATCH"));
}

#[test]
fn wrong_signer_is_restricted_without_code() {
    let server = server_with_canonical_record();
    let mut p = payload();
    p.signer_fingerprint = "0".repeat(64);
    let request = seal_request(&server, &p);

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Restricted);
    assert!(decision.error_code.is_none());
}

#[test]
fn unknown_version_is_rejected() {
    let server = server_with_canonical_record();
    let mut p = payload();
    p.version = "99.99.99".to_string();
    let request = seal_request(&server, &p);

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Rejected);
    assert_eq!(decision.error_code.as_deref(), Some("ERR_UNKNOWN_VERSION"));
}

#[test]
fn uppercase_merkle_root_is_approved() {
    let server = server_with_canonical_record();
    let mut p = payload();
    p.merkle_root = ROOT.to_ascii_uppercase();
    let request = seal_request(&server, &p);

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Approved);
}

#[test]
fn garbled_encapsulated_key_rejects_with_crypto_code() {
    let server = server_with_canonical_record();
    let mut request = seal_request(&server, &payload());

    // Well-formed base64 of random bytes with the wrong length for the
    // parameter set; decapsulation must fail before any lookup.
    use base64::Engine;
    request.encapsulated_key =
        base64::engine::general_purpose::STANDARD.encode([0x5Au8; 64]);

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Rejected);
    let code = decision.error_code.unwrap();
    assert!(code.starts_with("CRYPTO_"), "unexpected code {code}");
}

#[test]
fn tampered_payload_rejects_with_authentication_code() {
    let server = server_with_canonical_record();
    let request = seal_request(&server, &payload());

    use base64::Engine;
    let engine = base64::engine::general_purpose::STANDARD;
    let mut sealed = engine.decode(&request.encrypted_payload).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    let tampered = TransportEnvelope {
        encrypted_payload: engine.encode(sealed),
        ..request
    };

    let decision = server.handle_verification(&tampered);
    assert_eq!(decision.status, VerificationStatus::Rejected);
    assert_eq!(decision.error_code.as_deref(), Some("CRYPTO_008"));
}

#[test]
fn nonce_is_accepted_and_ignored() {
    let server = server_with_canonical_record();
    let mut request = seal_request(&server, &payload());
    request.nonce = Some("opaque-client-nonce".to_string());

    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Approved);
}

#[test]
fn registration_then_verification_observes_new_record() {
    let repository: Arc<dyn RecordRepository> =
        Arc::new(SqliteRecordRepository::open_in_memory().unwrap());
    let server = ServerState::init(&CryptoConfig::default(), Arc::clone(&repository)).unwrap();

    // Not yet registered.
    let request = seal_request(&server, &payload());
    let decision = server.handle_verification(&request);
    assert_eq!(decision.error_code.as_deref(), Some("ERR_UNKNOWN_VERSION"));

    // Register, then the same sealed request verifies.
    server
        .verifier()
        .register_record(CanonicalRecord::new("1.0.0", "release", ROOT, SIGNER))
        .unwrap();
    let decision = server.handle_verification(&request);
    assert_eq!(decision.status, VerificationStatus::Approved);
}
