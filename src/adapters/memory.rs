//! In-memory visit store, for embedding the services and for tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::{PatientRecord, QueueEntry, RecordId, RiskAssessment, VisitStatus};
use crate::ports::{PatientStore, StorageError};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    visits: BTreeMap<RecordId, QueueEntry>,
}

/// Visit store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn newest_first(entries: &mut [QueueEntry]) {
    entries.sort_by(|a, b| b.arrived_at.cmp(&a.arrived_at).then(b.id.cmp(&a.id)));
}

impl PatientStore for MemoryStore {
    type Error = StorageError;

    fn insert_visit(
        &self,
        record: &PatientRecord,
        assessment: &RiskAssessment,
        arrived_at: DateTime<Utc>,
    ) -> Result<QueueEntry, Self::Error> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let entry = QueueEntry {
            id: RecordId(state.next_id),
            arrived_at,
            status: VisitStatus::Waiting,
            risk_label: assessment.risk_level.to_string(),
            record: record.clone(),
            assessment: assessment.clone(),
        };
        state.visits.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn get_visit(&self, id: RecordId) -> Result<Option<QueueEntry>, Self::Error> {
        Ok(self.lock()?.visits.get(&id).cloned())
    }

    fn visits_with_status(&self, status: VisitStatus) -> Result<Vec<QueueEntry>, Self::Error> {
        let mut entries: Vec<QueueEntry> = self
            .lock()?
            .visits
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.arrived_at.cmp(&b.arrived_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    fn transition_status(
        &self,
        id: RecordId,
        from: VisitStatus,
        to: VisitStatus,
    ) -> Result<bool, Self::Error> {
        let mut state = self.lock()?;
        match state.visits.get_mut(&id) {
            Some(entry) if entry.status == from => {
                entry.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn recent_visits(&self, limit: usize) -> Result<Vec<QueueEntry>, Self::Error> {
        let mut entries: Vec<QueueEntry> = self.lock()?.visits.values().cloned().collect();
        newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    fn count_visits(&self) -> Result<usize, Self::Error> {
        Ok(self.lock()?.visits.len())
    }

    fn visits_for_user(&self, user_id: i64) -> Result<Vec<QueueEntry>, Self::Error> {
        let mut entries: Vec<QueueEntry> = self
            .lock()?
            .visits
            .values()
            .filter(|e| e.record.user_id == Some(user_id))
            .cloned()
            .collect();
        newest_first(&mut entries);
        Ok(entries)
    }
}
