//! Categorical encoders learned at training time.
//!
//! Each encoder maps the class strings seen during training to their index
//! in the stored class list. Values never seen during training map to
//! [`DEFAULT_CODE`] so unexpected free text degrades accuracy instead of
//! failing the assessment.

use std::collections::HashMap;

use super::assessment::RiskLevel;
use super::patient::{CategoricalCodes, FeatureVector, PatientRecord};

/// Code returned for values outside the training vocabulary.
pub const DEFAULT_CODE: u32 = 0;

/// Error building an encoder from a stored class list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    #[error("encoder {0} has no classes")]
    Empty(&'static str),

    #[error("encoder {field} lists class {class:?} more than once")]
    Duplicate { field: &'static str, class: String },

    #[error("label encoder class {0:?} is not a risk label")]
    UnknownLabel(String),

    #[error("label encoder must contain High, Medium and Low exactly once")]
    IncompleteLabels,
}

/// The categorical inputs of a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    Gender,
    Symptom,
    Consciousness,
    Condition,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        Self::Gender,
        Self::Symptom,
        Self::Consciousness,
        Self::Condition,
    ];

    /// Key used for this encoder in the model artifact.
    #[must_use]
    pub fn artifact_key(&self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::Symptom => "symptom",
            Self::Consciousness => "consciousness",
            Self::Condition => "condition",
        }
    }
}

/// A fixed string → code vocabulary.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    classes: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoricalEncoder {
    /// Build an encoder; the code of a class is its position in `classes`.
    ///
    /// # Errors
    /// Returns error if the list is empty or contains duplicates.
    pub fn from_classes(field: CategoricalField, classes: Vec<String>) -> Result<Self, EncoderError> {
        if classes.is_empty() {
            return Err(EncoderError::Empty(field.artifact_key()));
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), code as u32).is_some() {
                return Err(EncoderError::Duplicate {
                    field: field.artifact_key(),
                    class: class.clone(),
                });
            }
        }

        Ok(Self { classes, index })
    }

    /// Encode a raw value, falling back to [`DEFAULT_CODE`] when unknown.
    #[must_use]
    pub fn encode(&self, raw: &str) -> u32 {
        self.lookup(raw).unwrap_or(DEFAULT_CODE)
    }

    /// Encode a raw value, `None` when outside the vocabulary.
    #[must_use]
    pub fn lookup(&self, raw: &str) -> Option<u32> {
        self.index.get(raw.trim()).copied()
    }

    #[must_use]
    pub fn decode(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// One encoder per categorical field.
#[derive(Debug, Clone)]
pub struct EncoderSet {
    pub gender: CategoricalEncoder,
    pub symptom: CategoricalEncoder,
    pub consciousness: CategoricalEncoder,
    pub condition: CategoricalEncoder,
}

impl EncoderSet {
    #[must_use]
    pub fn get(&self, field: CategoricalField) -> &CategoricalEncoder {
        match field {
            CategoricalField::Gender => &self.gender,
            CategoricalField::Symptom => &self.symptom,
            CategoricalField::Consciousness => &self.consciousness,
            CategoricalField::Condition => &self.condition,
        }
    }

    #[must_use]
    pub fn encode(&self, field: CategoricalField, raw: &str) -> u32 {
        let encoder = self.get(field);
        match encoder.lookup(raw) {
            Some(code) => code,
            None => {
                tracing::debug!(
                    "Unknown {} category, using default code {DEFAULT_CODE}",
                    field.artifact_key()
                );
                DEFAULT_CODE
            }
        }
    }

    /// Encode a record into the classifier's feature vector.
    #[must_use]
    pub fn feature_vector(&self, record: &PatientRecord) -> FeatureVector {
        let codes = CategoricalCodes {
            gender: self.encode(CategoricalField::Gender, &record.gender),
            symptom: self.encode(CategoricalField::Symptom, &record.symptom),
            consciousness: self.encode(CategoricalField::Consciousness, &record.consciousness),
            condition: self.encode(CategoricalField::Condition, &record.condition),
        };
        FeatureVector::from_record(record, codes)
    }
}

/// Maps classifier output indices back to risk labels.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    labels: Vec<RiskLevel>,
}

impl LabelEncoder {
    /// Build from the stored class list (e.g. `["High", "Low", "Medium"]`).
    ///
    /// # Errors
    /// Returns error unless the list is a permutation of High/Medium/Low.
    pub fn from_classes(classes: &[String]) -> Result<Self, EncoderError> {
        let labels = classes
            .iter()
            .map(|c| c.parse::<RiskLevel>().map_err(|_| EncoderError::UnknownLabel(c.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let complete = labels.len() == RiskLevel::ALL.len()
            && RiskLevel::ALL.iter().all(|l| labels.contains(l));
        if !complete {
            return Err(EncoderError::IncompleteLabels);
        }

        Ok(Self { labels })
    }

    #[must_use]
    pub fn decode(&self, index: usize) -> Option<RiskLevel> {
        self.labels.get(index).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
