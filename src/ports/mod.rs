//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the triage core and its collaborators (model families, storage).

mod classifier;
mod store;

pub use classifier::{ClassifierError, RiskClassifier};
pub use store::{PatientStore, StorageError};
