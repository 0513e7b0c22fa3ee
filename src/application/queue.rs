//! Triage queue service: urgency-ordered view over waiting visits.
//!
//! The queue is never stored; it is recomputed from the `Waiting` set on
//! every call. Claiming the next patient is one critical section guarded by
//! a process-level mutex, and the store transition itself is a
//! compare-and-set, so a visit claimed by another process is skipped rather
//! than handed out twice.

use std::sync::{Arc, Mutex};

use crate::domain::{sort_for_triage, triage_order, QueueEntry, RecordId, VisitStatus};
use crate::ports::PatientStore;
use crate::TriageError;

/// Service for ordering and claiming waiting patients.
pub struct TriageQueue<S>
where
    S: PatientStore,
{
    store: Arc<S>,
    claim: Mutex<()>,
}

impl<S> TriageQueue<S>
where
    S: PatientStore,
{
    /// Create a queue over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            claim: Mutex::new(()),
        }
    }

    fn waiting(&self) -> Result<Vec<QueueEntry>, TriageError> {
        self.store
            .visits_with_status(VisitStatus::Waiting)
            .map_err(TriageError::storage)
    }

    /// Waiting visits in triage order. Read-only.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn list_queue(&self) -> Result<Vec<QueueEntry>, TriageError> {
        let mut entries = self.waiting()?;
        sort_for_triage(&mut entries);
        Ok(entries)
    }

    /// Claim the most urgent waiting visit and move it to `Consulting`.
    ///
    /// Returns `None` when nobody is waiting.
    ///
    /// # Errors
    /// Returns error if storage fails or the claim lock is poisoned.
    pub fn next_patient(&self) -> Result<Option<QueueEntry>, TriageError> {
        let _guard = self.claim.lock().map_err(|_| TriageError::QueueLockPoisoned)?;

        loop {
            let Some(mut entry) = self.waiting()?.into_iter().min_by(triage_order) else {
                return Ok(None);
            };

            let claimed = self
                .store
                .transition_status(entry.id, VisitStatus::Waiting, VisitStatus::Consulting)
                .map_err(TriageError::storage)?;

            if claimed {
                entry.status = VisitStatus::Consulting;
                tracing::info!("Visit {} called in (risk {})", entry.id, entry.risk_label);
                return Ok(Some(entry));
            }

            // Another process sharing the store won this one; look again.
            tracing::debug!("Visit {} already claimed elsewhere", entry.id);
        }
    }

    /// Mark a visit under consultation as completed.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id and `InvalidTransition` when the
    /// visit is not in `Consulting`.
    pub fn complete(&self, id: RecordId) -> Result<QueueEntry, TriageError> {
        let mut entry = self
            .store
            .get_visit(id)
            .map_err(TriageError::storage)?
            .ok_or(TriageError::NotFound(id))?;

        let to = VisitStatus::Completed;
        let invalid = |from| TriageError::InvalidTransition { id, from, to };
        if !entry.status.can_transition_to(to) {
            return Err(invalid(entry.status));
        }

        let done = self
            .store
            .transition_status(id, VisitStatus::Consulting, to)
            .map_err(TriageError::storage)?;
        if !done {
            // Status changed between the read and the update.
            let current = self
                .store
                .get_visit(id)
                .map_err(TriageError::storage)?
                .map_or(entry.status, |e| e.status);
            return Err(invalid(current));
        }

        entry.status = to;
        tracing::info!("Visit {id} completed");
        Ok(entry)
    }
}
