//! Analytics service: operational statistics and classifier benchmarking.
//!
//! Statistics are computed from the persisted visits (label as stored, not
//! re-assessed). The benchmark runs the active classifier alone; safety
//! overrides are deliberately left out so the score reflects the model.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::engine::HybridRiskEngine;
use crate::domain::{PatientIntake, PatientRecord, QueueEntry, RiskLevel, VisitStatus};
use crate::ports::PatientStore;
use crate::TriageError;

/// Aggregate view over persisted visits.
#[derive(Debug, Clone, Serialize)]
pub struct VisitStatistics {
    pub total_visits: usize,
    pub waiting: usize,

    /// Persisted risk label → visit count
    pub risk_distribution: BTreeMap<String, usize>,

    /// Department → visit count
    pub department_load: BTreeMap<String, usize>,

    /// Newest visits first
    pub recent: Vec<QueueEntry>,
}

/// One labelled row of a benchmark dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelledIntake {
    #[serde(flatten)]
    pub intake: PatientIntake,

    #[serde(rename = "Risk_Level", alias = "label")]
    pub label: String,
}

/// Classifier quality on a labelled dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub samples: usize,

    /// Rows dropped because the intake could not be converted
    pub skipped: usize,

    /// Percentage, two decimals
    pub accuracy: f64,

    /// Support-weighted F1 percentage, two decimals
    pub weighted_f1: f64,
}

fn percent(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

/// Accuracy and support-weighted F1 as fractions.
fn score(pairs: &[(RiskLevel, RiskLevel)]) -> (f64, f64) {
    let n = pairs.len() as f64;
    let correct = pairs.iter().filter(|(t, p)| t == p).count();

    let mut weighted = 0.0;
    for class in RiskLevel::ALL {
        let support = pairs.iter().filter(|(t, _)| *t == class).count();
        if support == 0 {
            continue;
        }
        let tp = pairs.iter().filter(|(t, p)| *t == class && *p == class).count() as f64;
        let predicted = pairs.iter().filter(|(_, p)| *p == class).count() as f64;

        let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
        let recall = tp / support as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        weighted += f1 * support as f64;
    }

    (correct as f64 / n, weighted / n)
}

/// Service for statistics and benchmarks.
pub struct AnalyticsService<S>
where
    S: PatientStore,
{
    engine: HybridRiskEngine,
    store: Arc<S>,
}

impl<S> AnalyticsService<S>
where
    S: PatientStore,
{
    pub fn new(engine: HybridRiskEngine, store: Arc<S>) -> Self {
        Self { engine, store }
    }

    /// Risk distribution, department load and the `recent_limit` newest visits.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn stats(&self, recent_limit: usize) -> Result<VisitStatistics, TriageError> {
        let total_visits = self.store.count_visits().map_err(TriageError::storage)?;
        let all = self
            .store
            .recent_visits(total_visits)
            .map_err(TriageError::storage)?;

        let mut risk_distribution = BTreeMap::new();
        let mut department_load = BTreeMap::new();
        let mut waiting = 0;
        for entry in &all {
            *risk_distribution.entry(entry.risk_label.clone()).or_insert(0) += 1;
            *department_load
                .entry(entry.assessment.department.clone())
                .or_insert(0) += 1;
            if entry.status == VisitStatus::Waiting {
                waiting += 1;
            }
        }

        let recent = all.into_iter().take(recent_limit).collect();

        tracing::info!("Generated statistics over {total_visits} visits");
        Ok(VisitStatistics {
            total_visits,
            waiting,
            risk_distribution,
            department_load,
            recent,
        })
    }

    /// Score the active classifier against labelled rows.
    ///
    /// # Errors
    /// Returns `Validation` for an empty dataset or an unknown label.
    pub fn benchmark(&self, rows: Vec<LabelledIntake>) -> Result<BenchmarkReport, TriageError> {
        if rows.is_empty() {
            return Err(TriageError::Validation("Benchmark dataset is empty".into()));
        }

        let mut pairs = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        for (row_idx, row) in rows.into_iter().enumerate() {
            let truth: RiskLevel = row.label.parse().map_err(|e| {
                TriageError::Validation(format!("Row {row_idx}: {e}"))
            })?;
            let record = match PatientRecord::try_from(row.intake) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping benchmark row {row_idx}: {e}");
                    skipped += 1;
                    continue;
                }
            };
            pairs.push((truth, self.engine.classify(&record)?));
        }

        if pairs.is_empty() {
            return Err(TriageError::Validation(
                "Benchmark dataset has no usable rows".into(),
            ));
        }

        let (accuracy, weighted_f1) = score(&pairs);
        let report = BenchmarkReport {
            samples: pairs.len(),
            skipped,
            accuracy: percent(accuracy),
            weighted_f1: percent(weighted_f1),
        };

        tracing::info!(
            "Benchmark: samples={} accuracy={:.2}% weighted_f1={:.2}% model={}",
            report.samples,
            report.accuracy,
            report.weighted_f1,
            self.engine.models().fingerprint()
        );
        Ok(report)
    }
}
