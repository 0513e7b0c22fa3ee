//! Domain layer: Core triage types and rules.
//!
//! Pure Rust types with no I/O. Everything here is deterministic and
//! safe to share across threads.

mod assessment;
mod encoder;
mod explain;
mod overrides;
mod patient;
mod queue;
pub mod recommendation;

pub use assessment::{ClassPrediction, Recommendation, RiskAssessment, RiskLevel, UnknownRiskLabel};
pub use encoder::{
    CategoricalEncoder, CategoricalField, EncoderError, EncoderSet, LabelEncoder, DEFAULT_CODE,
};
pub use explain::{
    named_attributions, narrative, ExplainError, RawAttributions, NARRATIVE_THRESHOLD,
    NARRATIVE_TOP_K,
};
pub use overrides::{
    apply_overrides, first_matching_rule, OverrideOutcome, SafetyRule, CRITICAL_BLOOD_PRESSURE,
    CRITICAL_O2_SATURATION, CRITICAL_TEMPERATURE,
};
pub use patient::{
    CategoricalCodes, EncodingError, FeatureVector, PatientIntake, PatientRecord,
    DEFAULT_CONDITION, DEFAULT_CONSCIOUSNESS, DEFAULT_O2_SATURATION, DEFAULT_PAIN_SEVERITY,
    FEATURE_COUNT, FEATURE_NAMES,
};
pub use queue::{
    priority_rank, sort_for_triage, triage_order, QueueEntry, RecordId, UnknownVisitStatus,
    VisitStatus,
};
pub use recommendation::recommend;
