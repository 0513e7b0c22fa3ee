//! # Medtriage
//!
//! Hybrid clinical triage: a trained classifier scores each patient record,
//! fixed safety rules can escalate the result, and waiting patients are
//! served in urgency order.
//!
//! This crate provides:
//! - A hybrid risk engine (classifier + explanation + safety overrides +
//!   department recommendation)
//! - A triage priority queue over persisted visits
//! - Hot-swappable, integrity-checked model artifacts
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core triage types (records, assessments, encoders, rules)
//! - `ports`: Trait definitions for classifiers and visit storage
//! - `adapters`: Concrete implementations (boosted trees, logistic
//!   regression, artifact loader, SQLite, in-memory store, log sanitizer)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Startup configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{PatientIntake, PatientRecord, QueueEntry, RecordId, RiskAssessment, RiskLevel};

use domain::{EncodingError, VisitStatus};

/// Result type for triage operations
pub type Result<T> = std::result::Result<T, TriageError>;

/// Main error type for triage operations
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Invalid patient data: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Model load failed: {0}")]
    ModelLoad(#[from] adapters::ModelLoadError),

    #[error("Classifier failed: {0}")]
    Classifier(#[from] ports::ClassifierError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] ports::StorageError),

    #[error("Visit {0} not found")]
    NotFound(RecordId),

    #[error("Visit {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: RecordId,
        from: VisitStatus,
        to: VisitStatus,
    },

    #[error("Queue lock poisoned")]
    QueueLockPoisoned,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TriageError {
    /// Convert any store error into the crate error.
    pub fn storage<E: Into<ports::StorageError>>(err: E) -> Self {
        Self::Storage(err.into())
    }
}
