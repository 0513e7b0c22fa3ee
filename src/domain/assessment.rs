//! Risk labels, classifier outputs and the assembled risk assessment.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Clinical urgency label.
///
/// Variant order is the triage order: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Immediate attention required
    High,
    /// Needs assessment, not immediately life-threatening
    Medium,
    /// Routine care
    Low,
}

impl RiskLevel {
    /// All labels in triage order.
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    /// Canonical label text, as produced by the training pipeline.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::High => "High risk - immediate clinical attention",
            Self::Medium => "Medium risk - prompt assessment recommended",
            Self::Low => "Low risk - routine care",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label string is not one of High/Medium/Low.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown risk label: {0:?}")]
pub struct UnknownRiskLabel(pub String);

impl FromStr for RiskLevel {
    type Err = UnknownRiskLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "High" => Ok(Self::High),
            "Medium" => Ok(Self::Medium),
            "Low" => Ok(Self::Low),
            other => Err(UnknownRiskLabel(other.to_string())),
        }
    }
}

/// Probability distribution over label codes plus its argmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    /// One probability per label code
    pub probabilities: Vec<f64>,

    /// Index of the most probable class (first index wins ties)
    pub predicted_class: usize,

    /// Probability of the predicted class
    pub confidence: f64,
}

impl ClassPrediction {
    /// Build a prediction from a probability vector.
    ///
    /// Returns `None` for an empty vector or one containing NaN.
    #[must_use]
    pub fn from_probabilities(probabilities: Vec<f64>) -> Option<Self> {
        if probabilities.iter().any(|p| p.is_nan()) {
            return None;
        }

        let (predicted_class, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (idx, p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((idx, p)),
            })?;

        Some(Self {
            probabilities,
            predicted_class,
            confidence,
        })
    }
}

/// Department, provisional diagnosis and care plan for a (symptom, risk) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub department: String,
    pub diagnosis: String,
    pub specialist: String,
    pub treatment: Vec<String>,
}

/// The complete output of one hybrid assessment.
///
/// Produced once per patient record and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Final label (after safety overrides)
    pub risk_level: RiskLevel,

    /// Final confidence in [0, 1]
    pub confidence: f64,

    /// Whether a safety rule replaced the classifier output
    pub overridden: bool,

    /// Reason reported by the safety rule that fired
    pub override_reason: Option<String>,

    /// Signed per-feature contributions toward the predicted class.
    /// Empty when attribution was unavailable.
    pub attributions: BTreeMap<String, f64>,

    pub department: String,
    pub diagnosis: String,
    pub specialist: String,
    pub treatment: Vec<String>,

    /// Narrative lines for clinical staff, most important first
    pub insights: Vec<String>,

    /// Fingerprint of the model artifact that produced this assessment
    pub model_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("High".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(" Medium ".parse::<RiskLevel>(), Ok(RiskLevel::Medium));
        assert_eq!("Low".parse::<RiskLevel>(), Ok(RiskLevel::Low));
        assert!("Critical".parse::<RiskLevel>().is_err());
        assert!("high".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_risk_level_order_is_triage_order() {
        let mut levels = vec![RiskLevel::Low, RiskLevel::High, RiskLevel::Medium];
        levels.sort();
        assert_eq!(levels, RiskLevel::ALL.to_vec());
    }

    #[test]
    fn test_prediction_argmax() {
        let pred = ClassPrediction::from_probabilities(vec![0.2, 0.5, 0.3]).expect("Should build");
        assert_eq!(pred.predicted_class, 1);
        assert!((pred.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prediction_ties_pick_first() {
        let pred = ClassPrediction::from_probabilities(vec![0.4, 0.4, 0.2]).expect("Should build");
        assert_eq!(pred.predicted_class, 0);
    }

    #[test]
    fn test_prediction_rejects_degenerate_input() {
        assert!(ClassPrediction::from_probabilities(vec![]).is_none());
        assert!(ClassPrediction::from_probabilities(vec![0.5, f64::NAN]).is_none());
    }
}
