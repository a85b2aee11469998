//! HTTP transport surface.
//!
//! Thin glue over the core: routes deserialize the wire contract,
//! delegate to [`ServerState`], and serialize decisions back. All three
//! verification outcomes travel with HTTP 200 so the transport status
//! alone reveals nothing about tampering.

use std::sync::Arc;

use anchorpq_core::envelope::{PublicKeyResponse, TransportEnvelope};
use anchorpq_core::verify::{CanonicalRecord, VerificationDecision};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::state::ServerState;

/// Builds the daemon router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/public-key", get(public_key))
        .route("/verify", post(verify))
        .route("/admin/records", post(register_record).delete(deactivate_record))
        .with_state(state)
}

async fn public_key(State(state): State<Arc<ServerState>>) -> Json<PublicKeyResponse> {
    Json(state.public_key_response())
}

async fn verify(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<TransportEnvelope>,
) -> Json<VerificationDecision> {
    Json(state.handle_verification(&request))
}

/// Body of a record registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRecordRequest {
    /// Application version.
    pub version: String,
    /// Build variant.
    pub variant: String,
    /// Canonical Merkle root (hex).
    #[serde(rename = "merkleRoot")]
    pub merkle_root: String,
    /// Canonical signer fingerprint (hex).
    #[serde(rename = "signerFingerprint")]
    pub signer_fingerprint: String,
    /// Optional operator note.
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of a record deactivation request.
#[derive(Debug, Deserialize)]
pub struct RecordKeyRequest {
    /// Application version.
    pub version: String,
    /// Build variant.
    pub variant: String,
}

async fn register_record(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RegisterRecordRequest>,
) -> Response {
    let mut record = CanonicalRecord::new(
        request.version,
        request.variant,
        &request.merkle_root,
        &request.signer_fingerprint,
    );
    record.description = request.description;

    match state.verifier().register_record(record) {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(e) => {
            error!(detail = %e, "record registration failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

async fn deactivate_record(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RecordKeyRequest>,
) -> Response {
    match state
        .verifier()
        .deactivate(&request.version, &request.variant)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(detail = %e, "record deactivation failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
