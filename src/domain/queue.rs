//! Visit lifecycle and triage ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::{RiskAssessment, RiskLevel};
use super::patient::PatientRecord;

/// Store-assigned identifier of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a visit is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisitStatus {
    Waiting,
    Consulting,
    Completed,
}

impl VisitStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::Consulting => "Consulting",
            Self::Completed => "Completed",
        }
    }

    /// Only Waiting → Consulting → Completed is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Consulting) | (Self::Consulting, Self::Completed)
        )
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown visit status: {0:?}")]
pub struct UnknownVisitStatus(pub String);

impl FromStr for VisitStatus {
    type Err = UnknownVisitStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waiting" => Ok(Self::Waiting),
            "Consulting" => Ok(Self::Consulting),
            "Completed" => Ok(Self::Completed),
            other => Err(UnknownVisitStatus(other.to_string())),
        }
    }
}

/// A persisted visit: the record, its assessment and its queue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: RecordId,
    pub arrived_at: DateTime<Utc>,
    pub status: VisitStatus,

    /// Risk label as persisted; rows written by other tools may hold
    /// values outside High/Medium/Low.
    pub risk_label: String,

    pub record: PatientRecord,
    pub assessment: RiskAssessment,
}

/// Queue rank of a persisted label: High 0, Medium 1, Low 2, anything else 3.
#[must_use]
pub fn priority_rank(label: &str) -> u8 {
    match label.parse::<RiskLevel>() {
        Ok(RiskLevel::High) => 0,
        Ok(RiskLevel::Medium) => 1,
        Ok(RiskLevel::Low) => 2,
        Err(_) => 3,
    }
}

/// Total triage order: risk rank, then arrival, then record id.
#[must_use]
pub fn triage_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    priority_rank(&a.risk_label)
        .cmp(&priority_rank(&b.risk_label))
        .then_with(|| a.arrived_at.cmp(&b.arrived_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort entries into triage order.
pub fn sort_for_triage(entries: &mut [QueueEntry]) {
    entries.sort_by(triage_order);
}
