//! Patient intake, validated patient records and the classifier feature vector.
//!
//! Intake payloads come from forms and document extraction and are only
//! best-effort: every field is optional and numbers may arrive as strings.
//! [`PatientRecord::try_from`] turns an intake into a typed record, applying
//! the documented defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default oxygen saturation when the intake omits it.
pub const DEFAULT_O2_SATURATION: u32 = 98;

/// Default pain severity when the intake omits it.
pub const DEFAULT_PAIN_SEVERITY: u8 = 0;

/// Default consciousness state when the intake omits it.
pub const DEFAULT_CONSCIOUSNESS: &str = "Alert";

/// Default pre-existing condition when the intake omits it.
pub const DEFAULT_CONDITION: &str = "None";

/// Failure to turn an intake into a patient record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("Missing required field {field}")]
    Missing { field: &'static str },

    #[error("Field {field} is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("Field {field} value {value} out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

/// Raw patient payload as submitted by the request layer.
///
/// Field names follow the training dataset columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientIntake {
    #[serde(rename = "Age", alias = "age", default)]
    pub age: Option<Value>,

    #[serde(rename = "Gender", alias = "gender", default)]
    pub gender: Option<String>,

    #[serde(rename = "Symptoms", alias = "symptom", alias = "symptoms", default)]
    pub symptom: Option<String>,

    #[serde(rename = "Blood_Pressure", alias = "blood_pressure", default)]
    pub blood_pressure: Option<Value>,

    #[serde(rename = "Heart_Rate", alias = "heart_rate", default)]
    pub heart_rate: Option<Value>,

    #[serde(rename = "Temperature", alias = "temperature", default)]
    pub temperature: Option<Value>,

    #[serde(rename = "O2_Saturation", alias = "o2_saturation", default)]
    pub o2_saturation: Option<Value>,

    #[serde(rename = "Pain_Severity", alias = "pain_severity", default)]
    pub pain_severity: Option<Value>,

    #[serde(rename = "Consciousness", alias = "consciousness", default)]
    pub consciousness: Option<String>,

    #[serde(
        rename = "Pre_Existing_Conditions",
        alias = "condition",
        alias = "pre_existing_conditions",
        default
    )]
    pub condition: Option<String>,

    /// Registered account the visit belongs to (opaque to the engine)
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// A validated patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years
    pub age: u32,

    pub gender: String,

    /// Single primary presenting symptom
    pub symptom: String,

    /// Systolic blood pressure in mmHg
    pub blood_pressure: u32,

    /// Heart rate in bpm
    pub heart_rate: u32,

    /// Body temperature in °C
    pub temperature: f64,

    /// Peripheral oxygen saturation in %
    pub o2_saturation: u32,

    /// Self-reported pain, 0-10
    pub pain_severity: u8,

    /// Alert / Confused / Unresponsive
    pub consciousness: String,

    /// Pre-existing condition ("None" when absent)
    pub condition: String,

    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self {
            age: 0,
            gender: String::new(),
            symptom: String::new(),
            blood_pressure: 120,
            heart_rate: 70,
            temperature: 37.0,
            o2_saturation: DEFAULT_O2_SATURATION,
            pain_severity: DEFAULT_PAIN_SEVERITY,
            consciousness: DEFAULT_CONSCIOUSNESS.to_string(),
            condition: DEFAULT_CONDITION.to_string(),
            user_id: None,
        }
    }
}

fn numeric(field: &'static str, value: Option<&Value>) -> Result<Option<f64>, EncodingError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(EncodingError::NotNumeric {
            field,
            value: value.map(ToString::to_string).unwrap_or_default(),
        }),
    }
}

fn required(field: &'static str, value: Option<&Value>) -> Result<f64, EncodingError> {
    numeric(field, value)?.ok_or(EncodingError::Missing { field })
}

fn whole(field: &'static str, v: f64, max: f64) -> Result<u32, EncodingError> {
    if v.fract() != 0.0 {
        return Err(EncodingError::NotNumeric {
            field,
            value: v.to_string(),
        });
    }
    if !(0.0..=max).contains(&v) {
        return Err(EncodingError::OutOfRange {
            field,
            value: v,
            expected: "integer within clinical bounds",
        });
    }
    Ok(v as u32)
}

fn categorical(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

impl TryFrom<PatientIntake> for PatientRecord {
    type Error = EncodingError;

    fn try_from(intake: PatientIntake) -> Result<Self, Self::Error> {
        let age = whole("Age", required("Age", intake.age.as_ref())?, 150.0)?;
        let blood_pressure = whole(
            "Blood_Pressure",
            required("Blood_Pressure", intake.blood_pressure.as_ref())?,
            400.0,
        )?;
        let heart_rate = whole(
            "Heart_Rate",
            required("Heart_Rate", intake.heart_rate.as_ref())?,
            400.0,
        )?;
        let temperature = required("Temperature", intake.temperature.as_ref())?;

        let o2_saturation = match numeric("O2_Saturation", intake.o2_saturation.as_ref())? {
            Some(v) => whole("O2_Saturation", v, 100.0)?,
            None => DEFAULT_O2_SATURATION,
        };

        let pain_severity = match numeric("Pain_Severity", intake.pain_severity.as_ref())? {
            Some(v) => whole("Pain_Severity", v, 10.0)? as u8,
            None => DEFAULT_PAIN_SEVERITY,
        };

        Ok(Self {
            age,
            gender: categorical(intake.gender, ""),
            symptom: categorical(intake.symptom, ""),
            blood_pressure,
            heart_rate,
            temperature,
            o2_saturation,
            pain_severity,
            consciousness: categorical(intake.consciousness, DEFAULT_CONSCIOUSNESS),
            condition: categorical(intake.condition, DEFAULT_CONDITION),
            user_id: intake.user_id,
        })
    }
}

/// Number of classifier input features.
pub const FEATURE_COUNT: usize = 10;

/// Feature names in the order the classifier was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "Gender",
    "Symptoms",
    "Blood_Pressure",
    "Heart_Rate",
    "Temperature",
    "O2_Saturation",
    "Pain_Severity",
    "Consciousness",
    "Pre_Existing_Conditions",
];

/// Integer codes for the categorical fields of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoricalCodes {
    pub gender: u32,
    pub symptom: u32,
    pub consciousness: u32,
    pub condition: u32,
}

/// Encoded classifier input.
///
/// Named fields keep the training column order out of callers' hands:
/// [`FeatureVector::to_array`] is the only place the order is spelled out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub age: f64,
    pub gender: f64,
    pub symptom: f64,
    pub blood_pressure: f64,
    pub heart_rate: f64,
    pub temperature: f64,
    pub o2_saturation: f64,
    pub pain_severity: f64,
    pub consciousness: f64,
    pub condition: f64,
}

impl FeatureVector {
    /// Combine a record's numeric fields with its categorical codes.
    #[must_use]
    pub fn from_record(record: &PatientRecord, codes: CategoricalCodes) -> Self {
        Self {
            age: f64::from(record.age),
            gender: f64::from(codes.gender),
            symptom: f64::from(codes.symptom),
            blood_pressure: f64::from(record.blood_pressure),
            heart_rate: f64::from(record.heart_rate),
            temperature: record.temperature,
            o2_saturation: f64::from(record.o2_saturation),
            pain_severity: f64::from(record.pain_severity),
            consciousness: f64::from(codes.consciousness),
            condition: f64::from(codes.condition),
        }
    }

    /// Features in [`FEATURE_NAMES`] order.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age,
            self.gender,
            self.symptom,
            self.blood_pressure,
            self.heart_rate,
            self.temperature,
            self.o2_saturation,
            self.pain_severity,
            self.consciousness,
            self.condition,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intake(value: Value) -> PatientIntake {
        serde_json::from_value(value).expect("Should deserialize intake")
    }

    #[test]
    fn test_intake_applies_defaults() {
        let record = PatientRecord::try_from(intake(json!({
            "Age": 40,
            "Gender": "Female",
            "Symptoms": "Cough",
            "Blood_Pressure": 130,
            "Heart_Rate": 80,
            "Temperature": 37.2
        })))
        .expect("Should convert");

        assert_eq!(record.o2_saturation, DEFAULT_O2_SATURATION);
        assert_eq!(record.pain_severity, DEFAULT_PAIN_SEVERITY);
        assert_eq!(record.consciousness, "Alert");
        assert_eq!(record.condition, "None");
    }

    #[test]
    fn test_intake_accepts_numeric_strings() {
        let record = PatientRecord::try_from(intake(json!({
            "Age": "61",
            "Blood_Pressure": " 145 ",
            "Heart_Rate": 92.0,
            "Temperature": "38.4",
            "O2_Saturation": "95"
        })))
        .expect("Should convert");

        assert_eq!(record.age, 61);
        assert_eq!(record.blood_pressure, 145);
        assert_eq!(record.heart_rate, 92);
        assert!((record.temperature - 38.4).abs() < f64::EPSILON);
        assert_eq!(record.o2_saturation, 95);
    }

    #[test]
    fn test_missing_required_numeric_is_an_error() {
        let err = PatientRecord::try_from(intake(json!({
            "Age": 30,
            "Heart_Rate": 70,
            "Temperature": 36.8
        })))
        .expect_err("Should fail");

        assert_eq!(
            err,
            EncodingError::Missing {
                field: "Blood_Pressure"
            }
        );
    }

    #[test]
    fn test_non_numeric_value_is_an_error() {
        let err = PatientRecord::try_from(intake(json!({
            "Age": 30,
            "Blood_Pressure": "high",
            "Heart_Rate": 70,
            "Temperature": 36.8
        })))
        .expect_err("Should fail");

        assert!(matches!(
            err,
            EncodingError::NotNumeric {
                field: "Blood_Pressure",
                ..
            }
        ));
    }

    #[test]
    fn test_fractional_integer_field_is_rejected() {
        let err = PatientRecord::try_from(intake(json!({
            "Age": 30.5,
            "Blood_Pressure": 120,
            "Heart_Rate": 70,
            "Temperature": 36.8
        })))
        .expect_err("Should fail");

        assert!(matches!(err, EncodingError::NotNumeric { field: "Age", .. }));
    }

    #[test]
    fn test_pain_out_of_range() {
        let err = PatientRecord::try_from(intake(json!({
            "Age": 30,
            "Blood_Pressure": 120,
            "Heart_Rate": 70,
            "Temperature": 36.8,
            "Pain_Severity": 11
        })))
        .expect_err("Should fail");

        assert!(matches!(
            err,
            EncodingError::OutOfRange {
                field: "Pain_Severity",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_age_is_rejected() {
        let err = PatientRecord::try_from(intake(json!({
            "Age": -1,
            "Blood_Pressure": 120,
            "Heart_Rate": 70,
            "Temperature": 36.8
        })))
        .expect_err("Should fail");

        assert!(matches!(err, EncodingError::OutOfRange { field: "Age", .. }));
    }

    #[test]
    fn test_feature_vector_order() {
        let record = PatientRecord {
            age: 55,
            blood_pressure: 142,
            heart_rate: 88,
            temperature: 38.1,
            o2_saturation: 93,
            pain_severity: 4,
            ..Default::default()
        };
        let codes = CategoricalCodes {
            gender: 1,
            symptom: 2,
            consciousness: 0,
            condition: 3,
        };

        let v = FeatureVector::from_record(&record, codes).to_array();
        assert_eq!(v.len(), FEATURE_NAMES.len());
        assert_eq!(v, [55.0, 1.0, 2.0, 142.0, 88.0, 38.1, 93.0, 4.0, 0.0, 3.0]);
    }
}
