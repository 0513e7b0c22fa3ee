//! Storage port: Trait for visit persistence.
//!
//! The priority queue is derived from this store; there is no separate
//! queue table.

use chrono::{DateTime, Utc};

use crate::domain::{PatientRecord, QueueEntry, RecordId, RiskAssessment, VisitStatus};

/// Backend-independent storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Trait for visit storage.
pub trait PatientStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + Into<StorageError> + 'static;

    /// Persist a new visit in `Waiting` status and return it with its id.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn insert_visit(
        &self,
        record: &PatientRecord,
        assessment: &RiskAssessment,
        arrived_at: DateTime<Utc>,
    ) -> Result<QueueEntry, Self::Error>;

    /// Load one visit.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_visit(&self, id: RecordId) -> Result<Option<QueueEntry>, Self::Error>;

    /// All visits in `status`, oldest arrival first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn visits_with_status(&self, status: VisitStatus) -> Result<Vec<QueueEntry>, Self::Error>;

    /// Compare-and-set the status of a visit.
    ///
    /// Returns `true` only if the visit existed and was in `from`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn transition_status(
        &self,
        id: RecordId,
        from: VisitStatus,
        to: VisitStatus,
    ) -> Result<bool, Self::Error>;

    /// Newest visits first, at most `limit`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn recent_visits(&self, limit: usize) -> Result<Vec<QueueEntry>, Self::Error>;

    /// Total number of visits.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count_visits(&self) -> Result<usize, Self::Error>;

    /// Visits of one registered user, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn visits_for_user(&self, user_id: i64) -> Result<Vec<QueueEntry>, Self::Error>;
}
