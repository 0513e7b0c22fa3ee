//! Hybrid risk engine: classifier output checked by the safety rules.
//!
//! One assessment runs the full pipeline against a single model snapshot:
//! 1. Encode categoricals and build the ordered feature vector
//! 2. Classify
//! 3. Explain the predicted class
//! 4. Apply safety overrides
//! 5. Recommend a department for the final label
//! 6. Render narrative insights

use std::collections::BTreeMap;
use std::sync::Arc;

use super::lifecycle::ModelRegistry;
use crate::adapters::ActiveModel;
use crate::domain::{
    apply_overrides, named_attributions, narrative, recommend, ClassPrediction, FeatureVector,
    PatientIntake, PatientRecord, RiskAssessment, RiskLevel,
};
use crate::ports::ClassifierError;
use crate::TriageError;

/// Service producing risk assessments from patient records.
#[derive(Debug, Clone)]
pub struct HybridRiskEngine {
    models: Arc<ModelRegistry>,
}

impl HybridRiskEngine {
    /// Create an engine reading from `models`.
    #[must_use]
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self { models }
    }

    /// The registry this engine reads from.
    #[must_use]
    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    /// Assess a raw intake.
    ///
    /// # Errors
    /// Returns `TriageError::Encoding` if a required numeric field is missing
    /// or invalid.
    pub fn assess_intake(
        &self,
        intake: PatientIntake,
    ) -> Result<(PatientRecord, RiskAssessment), TriageError> {
        let record = PatientRecord::try_from(intake)?;
        let assessment = self.assess(&record)?;
        Ok((record, assessment))
    }

    /// Assess a validated record.
    ///
    /// Unknown categorical values never fail; they encode to the default code.
    ///
    /// # Errors
    /// Returns error only if the classifier produces unusable output.
    pub fn assess(&self, record: &PatientRecord) -> Result<RiskAssessment, TriageError> {
        let model = self.models.get_active();

        let features = model.encoders.feature_vector(record);
        let prediction = model.classifier.predict(&features)?;
        let ml_label = decode_label(&model, &prediction)?;
        let attributions = explain(&model, &features, prediction.predicted_class);

        let outcome = apply_overrides(record, ml_label, prediction.confidence);
        let rec = recommend(&record.symptom, outcome.risk_level);

        let mut insights = Vec::with_capacity(4);
        if let Some(reason) = outcome.reason {
            insights.push(reason.to_string());
        }
        insights.extend(narrative(&attributions));

        tracing::info!(
            "Assessment complete: label={} confidence={:.2} overridden={} model={}",
            outcome.risk_level,
            outcome.confidence,
            outcome.overridden,
            model.fingerprint
        );

        Ok(RiskAssessment {
            risk_level: outcome.risk_level,
            confidence: outcome.confidence,
            overridden: outcome.overridden,
            override_reason: outcome.reason.map(str::to_string),
            attributions,
            department: rec.department,
            diagnosis: rec.diagnosis,
            specialist: rec.specialist,
            treatment: rec.treatment,
            insights,
            model_fingerprint: model.fingerprint.clone(),
        })
    }

    /// Classifier-only label for a record (no safety overrides).
    ///
    /// # Errors
    /// Returns error if the classifier produces unusable output.
    pub fn classify(&self, record: &PatientRecord) -> Result<RiskLevel, TriageError> {
        let model = self.models.get_active();
        let features = model.encoders.feature_vector(record);
        let prediction = model.classifier.predict(&features)?;
        decode_label(&model, &prediction)
    }
}

fn decode_label(
    model: &ActiveModel,
    prediction: &ClassPrediction,
) -> Result<RiskLevel, TriageError> {
    // The loader checks class counts against the label encoder.
    model
        .labels
        .decode(prediction.predicted_class)
        .ok_or(TriageError::Classifier(ClassifierError::Degenerate))
}

fn explain(model: &ActiveModel, features: &FeatureVector, class: usize) -> BTreeMap<String, f64> {
    match model
        .classifier
        .attributions(features)
        .and_then(|raw| named_attributions(&raw, class))
    {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("Explanation unavailable: {e}");
            BTreeMap::new()
        }
    }
}
