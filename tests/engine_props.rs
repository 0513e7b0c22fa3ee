//! Property and scenario tests for the hybrid risk engine.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use medtriage::adapters::artifact::parse_active;
use medtriage::adapters::IntegrityPolicy;
use medtriage::application::{HybridRiskEngine, ModelRegistry};
use medtriage::domain::{PatientIntake, PatientRecord, RiskLevel};
use medtriage::TriageError;
use proptest::prelude::*;

const DEMO: &[u8] = include_bytes!("../models/triage_model.json");

fn engine() -> HybridRiskEngine {
    let model = parse_active(DEMO, None).expect("Should parse demo model");
    HybridRiskEngine::new(Arc::new(ModelRegistry::new(model, IntegrityPolicy::default())))
}

const SYMPTOMS: [&str; 8] = [
    "Chest Pain",
    "Fever",
    "Cough",
    "Abdominal Pain",
    "Numbness",
    "Breathlessness",
    "Hiccups",
    "",
];

const CONSCIOUSNESS: [&str; 4] = ["Alert", "Confused", "Unresponsive", "Drowsy"];

prop_compose! {
    fn any_record()(
        age in 0u32..105,
        gender in prop::sample::select(vec!["Female", "Male", "Other"]),
        symptom in prop::sample::select(SYMPTOMS.to_vec()),
        blood_pressure in 60u32..240,
        heart_rate in 30u32..200,
        temperature in 34.0f64..42.5,
        o2_saturation in 70u32..=100,
        pain_severity in 0u8..=10,
        consciousness in prop::sample::select(CONSCIOUSNESS.to_vec()),
        condition in prop::sample::select(vec!["None", "Asthma", "Diabetes", "Hypertension", "Gout"]),
    ) -> PatientRecord {
        PatientRecord {
            age,
            gender: gender.to_string(),
            symptom: symptom.to_string(),
            blood_pressure,
            heart_rate,
            temperature,
            o2_saturation,
            pain_severity,
            consciousness: consciousness.to_string(),
            condition: condition.to_string(),
            user_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

proptest! {
    /// Critical blood pressure always wins, whatever else the record says.
    #[test]
    fn critical_blood_pressure_forces_high(record in any_record(), bp in 180u32..260) {
        let record = PatientRecord { blood_pressure: bp, ..record };
        let a = engine().assess(&record).expect("Should assess");

        prop_assert_eq!(a.risk_level, RiskLevel::High);
        prop_assert_eq!(a.confidence, 1.0);
        prop_assert!(a.overridden);
        prop_assert_eq!(a.override_reason.as_deref(), Some("Critical Blood Pressure (>180)"));
        prop_assert_eq!(a.insights[0].as_str(), "Critical Blood Pressure (>180)");
    }

    /// Fever and hypoxia escalate too; the first matching rule names the reason.
    #[test]
    fn later_rules_report_first_match(
        record in any_record(),
        temperature in 40.0f64..43.0,
        o2 in 50u32..90,
    ) {
        let engine = engine();

        let hot = PatientRecord { blood_pressure: 120, temperature, ..record.clone() };
        let a = engine.assess(&hot).expect("Should assess");
        prop_assert_eq!(a.risk_level, RiskLevel::High);
        prop_assert_eq!(
            a.override_reason.as_deref(),
            Some("Critical Body Temperature (>40°C)")
        );

        let hypoxic = PatientRecord {
            blood_pressure: 120,
            temperature: 37.0,
            o2_saturation: o2,
            ..record.clone()
        };
        let a = engine.assess(&hypoxic).expect("Should assess");
        prop_assert_eq!(a.override_reason.as_deref(), Some("Critical Hypoxia (O2 < 90%)"));

        let both = PatientRecord { blood_pressure: 120, temperature, o2_saturation: o2, ..record };
        let a = engine.assess(&both).expect("Should assess");
        prop_assert_eq!(
            a.override_reason.as_deref(),
            Some("Critical Body Temperature (>40°C)")
        );
    }

    /// Without a rule firing, the assessment is the classifier's argmax.
    #[test]
    fn no_override_is_classifier_argmax(record in any_record()) {
        let record = PatientRecord {
            blood_pressure: record.blood_pressure.min(179),
            temperature: record.temperature.min(39.9),
            o2_saturation: record.o2_saturation.max(90),
            ..record
        };
        let engine = engine();
        let model = engine.models().get_active();
        let features = model.encoders.feature_vector(&record);
        let prediction = model.classifier.predict(&features).expect("Should predict");
        let max = prediction.probabilities.iter().copied().fold(f64::MIN, f64::max);

        let a = engine.assess(&record).expect("Should assess");
        prop_assert!(!a.overridden);
        prop_assert!(a.override_reason.is_none());
        prop_assert_eq!(Some(a.risk_level), model.labels.decode(prediction.predicted_class));
        prop_assert_eq!(a.confidence, max);
        prop_assert!((0.0..=1.0).contains(&a.confidence));
    }

    /// Same record, same artifact: same assessment.
    #[test]
    fn assess_is_idempotent(record in any_record()) {
        let engine = engine();
        let first = engine.assess(&record).expect("Should assess");
        thread::sleep(Duration::from_millis(2));
        let second = engine.assess(&record).expect("Should assess");
        prop_assert_eq!(first, second);
    }

    /// Narrative holds at most the override reason plus three attributions.
    #[test]
    fn narrative_is_bounded(record in any_record()) {
        let a = engine().assess(&record).expect("Should assess");
        let limit = if a.overridden { 4 } else { 3 };
        prop_assert!(a.insights.len() <= limit);
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn intake(value: serde_json::Value) -> PatientIntake {
    serde_json::from_value(value).expect("Should parse intake")
}

#[test]
fn critical_patient_is_escalated() {
    let (_, a) = engine()
        .assess_intake(intake(serde_json::json!({
            "Age": 75,
            "Gender": "Male",
            "Symptoms": "Chest Pain",
            "Blood_Pressure": 190,
            "Heart_Rate": 120,
            "Temperature": 38.5,
            "O2_Saturation": 88,
            "Pain_Severity": 9,
            "Consciousness": "Confused",
            "Pre_Existing_Conditions": "Hypertension"
        })))
        .expect("Should assess");

    assert_eq!(a.risk_level, RiskLevel::High);
    assert!(a.overridden);
    assert!(a
        .override_reason
        .as_deref()
        .expect("Should have reason")
        .contains("Blood Pressure"));
    assert_eq!(a.department, "Cardiology (ER)");
}

#[test]
fn stable_fever_follows_classifier() {
    let (record, a) = engine()
        .assess_intake(intake(serde_json::json!({
            "Age": 25,
            "Gender": "Female",
            "Symptoms": "Fever",
            "Blood_Pressure": 120,
            "Heart_Rate": 72,
            "Temperature": 37.0,
            "O2_Saturation": 98,
            "Pain_Severity": 1,
            "Consciousness": "Alert"
        })))
        .expect("Should assess");

    assert_eq!(record.condition, "None");
    assert_eq!(a.risk_level, RiskLevel::Low);
    assert!(!a.overridden);
    assert_eq!(a.department, "General Medicine");
    assert_eq!(a.diagnosis, "Viral Syndrome");
    assert_eq!(a.treatment, vec!["Antipyretics", "Rest", "Fluids"]);
}

#[test]
fn non_numeric_vitals_are_rejected() {
    let err = engine()
        .assess_intake(intake(serde_json::json!({
            "Age": 40,
            "Blood_Pressure": 120,
            "Heart_Rate": "fast",
            "Temperature": 37.0
        })))
        .expect_err("Should fail");
    assert!(matches!(err, TriageError::Encoding(_)));
}
