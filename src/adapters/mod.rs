//! Adapters layer: Concrete implementations of ports.
//!
//! - `trees` / `logistic`: classifier families read from the model artifact
//! - `artifact`: artifact parsing, validation and integrity checks
//! - `sqlite` / `memory`: visit storage
//! - `sanitize`: PII filtering for logs

pub mod artifact;
pub mod logistic;
pub mod memory;
pub mod sanitize;
pub mod sqlite;
pub mod trees;

#[cfg(test)]
pub(crate) mod store_conformance;

pub use artifact::{load_artifact, ActiveModel, IntegrityPolicy, ModelArtifact, ModelLoadError};
pub use memory::MemoryStore;
pub use sqlite::{SqliteError, SqliteStore};
