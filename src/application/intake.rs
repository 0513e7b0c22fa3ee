//! Intake service: assess an arriving patient and put them in the queue.

use std::sync::Arc;

use chrono::Utc;

use super::engine::HybridRiskEngine;
use crate::domain::{PatientIntake, QueueEntry};
use crate::ports::PatientStore;
use crate::TriageError;

/// Service admitting patients into the waiting set.
pub struct IntakeService<S>
where
    S: PatientStore,
{
    engine: HybridRiskEngine,
    store: Arc<S>,
}

impl<S> IntakeService<S>
where
    S: PatientStore,
{
    pub fn new(engine: HybridRiskEngine, store: Arc<S>) -> Self {
        Self { engine, store }
    }

    /// Assess `intake` and persist it as a waiting visit.
    ///
    /// # Errors
    /// Returns `Encoding` for unusable intake data and `Storage` if the visit
    /// could not be saved. Nothing is persisted on error.
    pub fn admit(&self, intake: PatientIntake) -> Result<QueueEntry, TriageError> {
        let (record, assessment) = self.engine.assess_intake(intake)?;

        let entry = self
            .store
            .insert_visit(&record, &assessment, Utc::now())
            .map_err(TriageError::storage)?;

        tracing::info!(
            "Admitted visit {} (risk {}, department {})",
            entry.id,
            entry.risk_label,
            entry.assessment.department
        );
        Ok(entry)
    }

    /// Visits linked to `user_id`, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn history(&self, user_id: i64) -> Result<Vec<QueueEntry>, TriageError> {
        self.store
            .visits_for_user(user_id)
            .map_err(TriageError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::artifact::parse_active;
    use crate::adapters::{IntegrityPolicy, MemoryStore, SqliteStore};
    use crate::application::ModelRegistry;
    use crate::domain::{RiskLevel, VisitStatus};

    const DEMO: &str = include_str!("../../models/triage_model.json");

    fn engine() -> HybridRiskEngine {
        let model = parse_active(DEMO.as_bytes(), None).expect("Should parse demo model");
        HybridRiskEngine::new(Arc::new(ModelRegistry::new(model, IntegrityPolicy::default())))
    }

    fn intake(value: serde_json::Value) -> PatientIntake {
        serde_json::from_value(value).expect("Should parse intake")
    }

    #[test]
    fn test_admit_persists_waiting_visit() {
        let store = Arc::new(MemoryStore::new());
        let service = IntakeService::new(engine(), Arc::clone(&store));

        let entry = service
            .admit(intake(serde_json::json!({
                "Age": "25",
                "Gender": "Male",
                "Symptoms": "Fever",
                "Blood_Pressure": 118,
                "Heart_Rate": 76,
                "Temperature": "37.0",
                "user_id": 7
            })))
            .expect("Should admit");

        assert_eq!(entry.status, VisitStatus::Waiting);
        assert_eq!(entry.assessment.risk_level, RiskLevel::Low);
        assert_eq!(entry.risk_label, "Low");
        assert_eq!(store.count_visits().expect("Should count"), 1);

        let history = service.history(7).expect("Should load history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.id);
        assert!(service.history(8).expect("Should load history").is_empty());
    }

    #[test]
    fn test_invalid_intake_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let service = IntakeService::new(engine(), Arc::clone(&store));

        let err = service
            .admit(intake(serde_json::json!({
                "Age": 50,
                "Blood_Pressure": "high",
                "Heart_Rate": 80,
                "Temperature": 37.2
            })))
            .expect_err("Should reject");
        assert!(matches!(err, TriageError::Encoding(_)));
        assert_eq!(store.count_visits().expect("Should count"), 0);
    }

    #[test]
    fn test_admit_into_sqlite() {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let service = IntakeService::new(engine(), Arc::clone(&store));

        let entry = service
            .admit(intake(serde_json::json!({
                "Age": 80,
                "Symptoms": "Chest Pain",
                "Blood_Pressure": 185,
                "Heart_Rate": 110,
                "Temperature": 37.5
            })))
            .expect("Should admit");

        let loaded = store
            .get_visit(entry.id)
            .expect("Should load")
            .expect("Should exist");
        assert!(loaded.assessment.overridden);
        assert_eq!(loaded.assessment.department, "Cardiology (ER)");
    }
}
