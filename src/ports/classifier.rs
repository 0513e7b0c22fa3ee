//! Classifier port: Trait for multi-class risk models.
//!
//! Abstracts the concrete model family (boosted trees, logistic regression)
//! from the risk engine.

use crate::domain::{ClassPrediction, ExplainError, FeatureVector, RawAttributions};

/// Error evaluating a classifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier produced no usable probabilities")]
    Degenerate,

    #[error("classifier produced a non-finite value: {0}")]
    NonFinite(String),
}

/// Trait for a trained multi-class classifier.
///
/// Implementations are immutable once constructed and may be shared
/// between threads freely.
pub trait RiskClassifier: Send + Sync + std::fmt::Debug {
    /// Short model family name (for logs and `model-info`).
    fn kind(&self) -> &'static str;

    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Class probabilities for one feature vector, indexed by label code.
    ///
    /// # Errors
    /// Returns error if evaluation produces non-finite values.
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError>;

    /// Argmax prediction for one feature vector.
    ///
    /// # Errors
    /// Returns error if the probabilities are unusable.
    fn predict(&self, features: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
        let probabilities = self.predict_proba(features)?;
        ClassPrediction::from_probabilities(probabilities).ok_or(ClassifierError::Degenerate)
    }

    /// Per-feature contributions in whatever shape the model natively yields.
    ///
    /// # Errors
    /// Returns `ExplainError::Unsupported` when the model cannot explain itself.
    fn attributions(&self, _features: &FeatureVector) -> Result<RawAttributions, ExplainError> {
        Err(ExplainError::Unsupported)
    }
}
