//! SQLite-backed canonical-record repository.
//!
//! A single connection behind a mutex: writes serialize, and every read
//! observes all prior writes through the same connection, which gives
//! the read-your-writes consistency the verification core requires.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anchorpq_core::verify::{CanonicalRecord, RecordRepository, RepositoryError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

/// Durable record store backed by SQLite.
#[derive(Debug)]
pub struct SqliteRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordRepository {
    /// Opens (or creates) the database at `path` and initializes the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::init_schema(&conn)?;
        info!(db = %path.display(), "record repository opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database, for tests and ephemeral deployments.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS integrity_records (
                version TEXT NOT NULL,
                variant TEXT NOT NULL,
                merkle_root TEXT NOT NULL,
                signer_fingerprint TEXT NOT NULL,
                description TEXT,
                active INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (version, variant)
            )",
            [],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::new("connection lock poisoned"))
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn find_active(
        &self,
        version: &str,
        variant: &str,
    ) -> Result<Option<CanonicalRecord>, RepositoryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT version, variant, merkle_root, signer_fingerprint, description,
                    active, created_at, updated_at
             FROM integrity_records
             WHERE version = ?1 AND variant = ?2 AND active = 1",
            params![version, variant],
            row_to_record,
        )
        .optional()
        .map_err(backend)
    }

    fn save_or_update(&self, record: CanonicalRecord) -> Result<CanonicalRecord, RepositoryError> {
        let conn = self.lock()?;

        // Preserve created_at across upserts.
        let existing_created_at: Option<String> = conn
            .query_row(
                "SELECT created_at FROM integrity_records WHERE version = ?1 AND variant = ?2",
                params![record.version, record.variant],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;

        let now = Utc::now();
        let mut stored = record;
        stored.updated_at = now;
        if let Some(created_at) = existing_created_at {
            stored.created_at = parse_timestamp(&created_at)?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO integrity_records
                 (version, variant, merkle_root, signer_fingerprint, description,
                  active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stored.version,
                stored.variant,
                stored.merkle_root,
                stored.signer_fingerprint,
                stored.description,
                i64::from(stored.active),
                stored.created_at.to_rfc3339(),
                stored.updated_at.to_rfc3339(),
            ],
        )
        .map_err(backend)?;

        Ok(stored)
    }

    fn deactivate(&self, version: &str, variant: &str) -> Result<(), RepositoryError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE integrity_records SET active = 0, updated_at = ?3
             WHERE version = ?1 AND variant = ?2",
            params![version, variant, Utc::now().to_rfc3339()],
        )
        .map_err(backend)?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanonicalRecord> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(CanonicalRecord {
        version: row.get(0)?,
        variant: row.get(1)?,
        merkle_root: row.get(2)?,
        signer_fingerprint: row.get(3)?,
        description: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        created_at: parse_timestamp_lossy(&created_at),
        updated_at: parse_timestamp_lossy(&updated_at),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::new(format!("corrupt timestamp column: {e}")))
}

fn parse_timestamp_lossy(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

fn backend(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::new(e.to_string())
}
