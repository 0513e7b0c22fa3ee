//! Deterministic vital-sign safety rules.
//!
//! Rules run after the classifier, in a fixed order. The first rule whose
//! threshold is crossed forces the label to `High` with confidence 1.0;
//! later rules are not evaluated.

use super::assessment::RiskLevel;
use super::patient::PatientRecord;

/// Systolic blood pressure (mmHg) at or above which a patient is critical.
pub const CRITICAL_BLOOD_PRESSURE: u32 = 180;

/// Body temperature (°C) at or above which a patient is critical.
pub const CRITICAL_TEMPERATURE: f64 = 40.0;

/// Oxygen saturation (%) below which a patient is hypoxic.
pub const CRITICAL_O2_SATURATION: u32 = 90;

/// One hard clinical threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyRule {
    CriticalBloodPressure,
    CriticalTemperature,
    CriticalHypoxia,
}

impl SafetyRule {
    /// Rules in evaluation order.
    pub const ORDERED: [SafetyRule; 3] = [
        Self::CriticalBloodPressure,
        Self::CriticalTemperature,
        Self::CriticalHypoxia,
    ];

    #[must_use]
    pub fn matches(&self, record: &PatientRecord) -> bool {
        match self {
            Self::CriticalBloodPressure => record.blood_pressure >= CRITICAL_BLOOD_PRESSURE,
            Self::CriticalTemperature => record.temperature >= CRITICAL_TEMPERATURE,
            Self::CriticalHypoxia => record.o2_saturation < CRITICAL_O2_SATURATION,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CriticalBloodPressure => "Critical Blood Pressure (>180)",
            Self::CriticalTemperature => "Critical Body Temperature (>40°C)",
            Self::CriticalHypoxia => "Critical Hypoxia (O2 < 90%)",
        }
    }
}

/// Result of running the safety rules over a classifier decision.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideOutcome {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub overridden: bool,
    pub reason: Option<&'static str>,
}

/// The first rule that fires for `record`, if any.
#[must_use]
pub fn first_matching_rule(record: &PatientRecord) -> Option<SafetyRule> {
    SafetyRule::ORDERED.into_iter().find(|rule| rule.matches(record))
}

/// Apply the safety rules to a classifier decision.
///
/// Consciousness has no rule and never changes the outcome.
#[must_use]
pub fn apply_overrides(
    record: &PatientRecord,
    ml_label: RiskLevel,
    ml_confidence: f64,
) -> OverrideOutcome {
    match first_matching_rule(record) {
        Some(rule) => OverrideOutcome {
            risk_level: RiskLevel::High,
            confidence: 1.0,
            overridden: true,
            reason: Some(rule.reason()),
        },
        None => OverrideOutcome {
            risk_level: ml_label,
            confidence: ml_confidence,
            overridden: false,
            reason: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable() -> PatientRecord {
        PatientRecord {
            age: 40,
            blood_pressure: 125,
            heart_rate: 72,
            temperature: 36.9,
            o2_saturation: 98,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_rule_passes_through() {
        let outcome = apply_overrides(&stable(), RiskLevel::Low, 0.83);
        assert_eq!(outcome.risk_level, RiskLevel::Low);
        assert!((outcome.confidence - 0.83).abs() < f64::EPSILON);
        assert!(!outcome.overridden);
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn test_blood_pressure_threshold_is_inclusive() {
        let record = PatientRecord {
            blood_pressure: 180,
            ..stable()
        };
        let outcome = apply_overrides(&record, RiskLevel::Low, 0.9);
        assert_eq!(outcome.risk_level, RiskLevel::High);
        assert!((outcome.confidence - 1.0).abs() < f64::EPSILON);
        assert!(outcome.overridden);
        assert_eq!(outcome.reason, Some("Critical Blood Pressure (>180)"));

        let below = PatientRecord {
            blood_pressure: 179,
            ..stable()
        };
        assert!(!apply_overrides(&below, RiskLevel::Low, 0.9).overridden);
    }

    #[test]
    fn test_temperature_threshold_is_inclusive() {
        let record = PatientRecord {
            temperature: 40.0,
            ..stable()
        };
        let outcome = apply_overrides(&record, RiskLevel::Medium, 0.6);
        assert_eq!(outcome.reason, Some("Critical Body Temperature (>40°C)"));

        let below = PatientRecord {
            temperature: 39.9,
            ..stable()
        };
        assert!(!apply_overrides(&below, RiskLevel::Medium, 0.6).overridden);
    }

    #[test]
    fn test_hypoxia_threshold_is_exclusive() {
        let record = PatientRecord {
            o2_saturation: 89,
            ..stable()
        };
        assert_eq!(
            apply_overrides(&record, RiskLevel::Low, 0.7).reason,
            Some("Critical Hypoxia (O2 < 90%)")
        );

        let at_threshold = PatientRecord {
            o2_saturation: 90,
            ..stable()
        };
        assert!(!apply_overrides(&at_threshold, RiskLevel::Low, 0.7).overridden);
    }

    #[test]
    fn test_first_rule_wins() {
        let record = PatientRecord {
            blood_pressure: 190,
            temperature: 40.5,
            o2_saturation: 85,
            ..stable()
        };
        assert_eq!(
            first_matching_rule(&record),
            Some(SafetyRule::CriticalBloodPressure)
        );

        let no_bp = PatientRecord {
            blood_pressure: 150,
            ..record
        };
        assert_eq!(
            first_matching_rule(&no_bp),
            Some(SafetyRule::CriticalTemperature)
        );
    }

    #[test]
    fn test_consciousness_is_informational() {
        let record = PatientRecord {
            consciousness: "Unresponsive".into(),
            ..stable()
        };
        assert!(!apply_overrides(&record, RiskLevel::Low, 0.5).overridden);
    }
}
