//! The canonical-record repository interface.
//!
//! Storage is external to the verification core; the core only requires
//! linearizable reads against the repository's own writes so that a
//! verify following a `save_or_update` observes the new record.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use super::record::CanonicalRecord;

/// A backend failure. The message is logged server-side and masked to
/// `ERR_INTERNAL` before anything reaches a client.
#[derive(Debug, Error)]
#[error("repository error: {message}")]
pub struct RepositoryError {
    /// Backend detail, never sent to clients.
    pub message: String,
}

impl RepositoryError {
    /// Wraps a backend failure message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Canonical-record storage operations.
///
/// Implementations must provide read-your-writes consistency per
/// `(version, variant)` key; the verifier re-fetches per request and
/// holds no cache.
pub trait RecordRepository: Send + Sync {
    /// Returns the active record for `(version, variant)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    fn find_active(
        &self,
        version: &str,
        variant: &str,
    ) -> Result<Option<CanonicalRecord>, RepositoryError>;

    /// Inserts or updates the record keyed by `(version, variant)`.
    ///
    /// On update, `created_at` of the existing record is preserved and
    /// `updated_at` is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    fn save_or_update(&self, record: CanonicalRecord) -> Result<CanonicalRecord, RepositoryError>;

    /// Logically deletes the record for `(version, variant)`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] on backend failure.
    fn deactivate(&self, version: &str, variant: &str) -> Result<(), RepositoryError>;
}

/// In-memory repository for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<HashMap<(String, String), CanonicalRecord>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> RepositoryError {
        RepositoryError::new("record map lock poisoned")
    }
}

impl RecordRepository for InMemoryRepository {
    fn find_active(
        &self,
        version: &str,
        variant: &str,
    ) -> Result<Option<CanonicalRecord>, RepositoryError> {
        let records = self.records.read().map_err(|_| Self::lock_poisoned())?;
        Ok(records
            .get(&(version.to_string(), variant.to_string()))
            .filter(|record| record.active)
            .cloned())
    }

    fn save_or_update(&self, record: CanonicalRecord) -> Result<CanonicalRecord, RepositoryError> {
        let mut records = self.records.write().map_err(|_| Self::lock_poisoned())?;
        let key = (record.version.clone(), record.variant.clone());

        let stored = match records.get(&key) {
            Some(existing) => {
                let mut updated = record;
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                updated
            },
            None => record,
        };
        records.insert(key, stored.clone());
        Ok(stored)
    }

    fn deactivate(&self, version: &str, variant: &str) -> Result<(), RepositoryError> {
        let mut records = self.records.write().map_err(|_| Self::lock_poisoned())?;
        if let Some(record) = records.get_mut(&(version.to_string(), variant.to_string())) {
            record.active = false;
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}
