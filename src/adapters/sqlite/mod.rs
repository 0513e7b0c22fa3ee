//! SQLite adapter: Implementation of `PatientStore`.
//!
//! One `visits` row per admitted patient. The record and its assessment are
//! stored as JSON next to the columns the queue and analytics filter on.
//!
//! # Concurrency
//!
//! The connection is guarded by a `Mutex`; a poisoned mutex surfaces as
//! `LockPoisoned` instead of a panic. Status changes are a single
//! conditional `UPDATE`, so two processes sharing one database file cannot
//! both claim the same visit.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{PatientRecord, QueueEntry, RecordId, RiskAssessment, VisitStatus};
use crate::ports::{PatientStore, StorageError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_VISIT: &str = "SELECT id, arrived_at, status, risk_level, record_json, assessment_json FROM visits";

/// Error type for SQLite operations.
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl From<SqliteError> for StorageError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Database(e) => StorageError::Backend(Box::new(e)),
            SqliteError::Serialization(e) => StorageError::Serialization(e.to_string()),
            SqliteError::Corrupt { id, reason } => StorageError::Corrupt { id, reason },
            SqliteError::LockPoisoned => StorageError::LockPoisoned,
        }
    }
}

/// Columns of a `visits` row before decoding.
struct RawVisit {
    id: i64,
    arrived_at: String,
    status: String,
    risk_level: String,
    record_json: String,
    assessment_json: String,
}

impl RawVisit {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            arrived_at: row.get(1)?,
            status: row.get(2)?,
            risk_level: row.get(3)?,
            record_json: row.get(4)?,
            assessment_json: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<QueueEntry, SqliteError> {
        let corrupt = |reason: String| SqliteError::Corrupt {
            id: self.id,
            reason,
        };

        let arrived_at = DateTime::parse_from_rfc3339(&self.arrived_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("arrived_at: {e}")))?;
        let status = self
            .status
            .parse::<VisitStatus>()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(QueueEntry {
            id: RecordId(self.id),
            arrived_at,
            status,
            risk_label: self.risk_level,
            record: serde_json::from_str(&self.record_json)?,
            assessment: serde_json::from_str(&self.assessment_json)?,
        })
    }
}

/// Fixed-width UTC timestamps so text order is time order.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite visit store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, SqliteError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SqliteError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteError> {
        self.conn.lock().map_err(|_| SqliteError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), SqliteError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                arrived_at TEXT NOT NULL,
                status TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                department TEXT NOT NULL,
                confidence REAL NOT NULL,
                record_json TEXT NOT NULL,
                assessment_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_visits_status_arrival
                ON visits(status, arrived_at);

            CREATE INDEX IF NOT EXISTS idx_visits_user
                ON visits(user_id, arrived_at DESC);
            ",
        )?;

        Ok(())
    }

    fn query_entries(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<QueueEntry>, SqliteError> {
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, RawVisit::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawVisit::into_entry).collect()
    }
}

impl PatientStore for SqliteStore {
    type Error = SqliteError;

    fn insert_visit(
        &self,
        record: &PatientRecord,
        assessment: &RiskAssessment,
        arrived_at: DateTime<Utc>,
    ) -> Result<QueueEntry, Self::Error> {
        let record_json = serde_json::to_string(record)?;
        let assessment_json = serde_json::to_string(assessment)?;
        let risk_label = assessment.risk_level.to_string();

        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT INTO visits (
                user_id, arrived_at, status, risk_level, department,
                confidence, record_json, assessment_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                record.user_id,
                timestamp(&arrived_at),
                VisitStatus::Waiting.as_str(),
                risk_label,
                assessment.department,
                assessment.confidence,
                record_json,
                assessment_json,
            ],
        )?;
        let id = RecordId(conn.last_insert_rowid());

        tracing::debug!("Saved visit {id} to storage");
        Ok(QueueEntry {
            id,
            arrived_at,
            status: VisitStatus::Waiting,
            risk_label,
            record: record.clone(),
            assessment: assessment.clone(),
        })
    }

    fn get_visit(&self, id: RecordId) -> Result<Option<QueueEntry>, Self::Error> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{SELECT_VISIT} WHERE id = ?1"),
                params![id.0],
                RawVisit::from_row,
            )
            .optional()?;
        raw.map(RawVisit::into_entry).transpose()
    }

    fn visits_with_status(&self, status: VisitStatus) -> Result<Vec<QueueEntry>, Self::Error> {
        let conn = self.lock()?;
        Self::query_entries(
            &conn,
            &format!("{SELECT_VISIT} WHERE status = ?1 ORDER BY arrived_at ASC, id ASC"),
            params![status.as_str()],
        )
    }

    fn transition_status(
        &self,
        id: RecordId,
        from: VisitStatus,
        to: VisitStatus,
    ) -> Result<bool, Self::Error> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE visits SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.as_str(), id.0, from.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn recent_visits(&self, limit: usize) -> Result<Vec<QueueEntry>, Self::Error> {
        let conn = self.lock()?;
        Self::query_entries(
            &conn,
            &format!("{SELECT_VISIT} ORDER BY arrived_at DESC, id DESC LIMIT ?1"),
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
        )
    }

    fn count_visits(&self) -> Result<usize, Self::Error> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM visits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn visits_for_user(&self, user_id: i64) -> Result<Vec<QueueEntry>, Self::Error> {
        let conn = self.lock()?;
        Self::query_entries(
            &conn,
            &format!("{SELECT_VISIT} WHERE user_id = ?1 ORDER BY arrived_at DESC, id DESC"),
            params![user_id],
        )
    }
}
