//! Integration tests for the triage queue over real stores.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use medtriage::adapters::artifact::parse_active;
use medtriage::adapters::{IntegrityPolicy, MemoryStore, SqliteStore};
use medtriage::application::{HybridRiskEngine, ModelRegistry, TriageQueue};
use medtriage::domain::{PatientRecord, RecordId, VisitStatus};
use medtriage::ports::PatientStore;

const DEMO: &[u8] = include_bytes!("../models/triage_model.json");

fn engine() -> HybridRiskEngine {
    let model = parse_active(DEMO, None).expect("Should parse demo model");
    HybridRiskEngine::new(Arc::new(ModelRegistry::new(model, IntegrityPolicy::default())))
}

/// Records the demo model labels Low, Medium and High respectively.
fn record_for(label: &str) -> PatientRecord {
    let base = PatientRecord {
        age: 25,
        symptom: "Fever".into(),
        blood_pressure: 120,
        heart_rate: 75,
        temperature: 37.0,
        ..Default::default()
    };
    match label {
        "High" => PatientRecord {
            pain_severity: 9,
            ..base
        },
        "Medium" => PatientRecord { age: 80, ..base },
        _ => base,
    }
}

/// Admit visits with the given labels, one minute apart.
fn admit_all<S: PatientStore>(store: &S, labels: &[&str]) -> Vec<RecordId>
where
    S::Error: std::fmt::Debug,
{
    let engine = engine();
    let start = Utc
        .with_ymd_and_hms(2026, 5, 4, 9, 0, 0)
        .single()
        .expect("Should build timestamp");

    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let record = record_for(label);
            let assessment = engine.assess(&record).expect("Should assess");
            assert_eq!(assessment.risk_level.as_str(), *label);
            store
                .insert_visit(&record, &assessment, start + Duration::minutes(i as i64))
                .expect("Should insert")
                .id
        })
        .collect()
}

fn drain_concurrently<S>(queues: Vec<Arc<TriageQueue<S>>>, workers_per_queue: usize) -> Vec<RecordId>
where
    S: PatientStore + 'static,
{
    let handles: Vec<_> = queues
        .iter()
        .flat_map(|queue| (0..workers_per_queue).map(move |_| Arc::clone(queue)))
        .map(|queue| {
            thread::spawn(move || {
                let mut claimed = Vec::new();
                while let Some(entry) = queue.next_patient().expect("Should claim") {
                    assert_eq!(entry.status, VisitStatus::Consulting);
                    claimed.push(entry.id);
                }
                claimed
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|h| h.join().expect("Worker should not panic"))
        .collect()
}

fn assert_each_claimed_once(mut claimed: Vec<RecordId>, admitted: &[RecordId]) {
    let unique: BTreeSet<RecordId> = claimed.iter().copied().collect();
    assert_eq!(unique.len(), claimed.len(), "a visit was claimed twice");

    claimed.sort();
    let mut expected = admitted.to_vec();
    expected.sort();
    assert_eq!(claimed, expected);
}

#[test]
fn queue_orders_by_risk_then_arrival() {
    let store = Arc::new(MemoryStore::new());
    let ids = admit_all(store.as_ref(), &["Low", "High", "Medium", "High"]);
    let queue = TriageQueue::new(store);

    let listed: Vec<RecordId> = queue
        .list_queue()
        .expect("Should list")
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(listed, vec![ids[1], ids[3], ids[2], ids[0]]);

    let mut served = Vec::new();
    while let Some(entry) = queue.next_patient().expect("Should claim") {
        served.push(entry.id);
    }
    assert_eq!(served, listed);
}

#[test]
fn concurrent_claims_on_memory_store() {
    let store = Arc::new(MemoryStore::new());
    let labels: Vec<&str> = (0..60)
        .map(|i| ["High", "Medium", "Low"][i % 3])
        .collect();
    let ids = admit_all(store.as_ref(), &labels);

    let queue = Arc::new(TriageQueue::new(store));
    let claimed = drain_concurrently(vec![queue], 8);
    assert_each_claimed_once(claimed, &ids);
}

#[test]
fn concurrent_claims_across_sqlite_connections() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join("queue.db");

    let ids = {
        let store = SqliteStore::open(&path).expect("Should open db");
        let labels: Vec<&str> = (0..40)
            .map(|i| ["Low", "High", "Medium"][i % 3])
            .collect();
        admit_all(&store, &labels)
    };

    // Two independent connections behave like two processes sharing the file.
    let queues = (0..2)
        .map(|_| Arc::new(TriageQueue::new(Arc::new(SqliteStore::open(&path).expect("Should open db")))))
        .collect();
    let claimed = drain_concurrently(queues, 4);
    assert_each_claimed_once(claimed, &ids);

    let store = SqliteStore::open(&path).expect("Should open db");
    assert!(store
        .visits_with_status(VisitStatus::Waiting)
        .expect("Should query")
        .is_empty());
    assert_eq!(
        store
            .visits_with_status(VisitStatus::Consulting)
            .expect("Should query")
            .len(),
        ids.len()
    );
}

#[test]
fn completed_visits_leave_the_queue() {
    let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
    let ids = admit_all(store.as_ref(), &["Medium", "Low"]);
    let queue = TriageQueue::new(Arc::clone(&store));

    let first = queue
        .next_patient()
        .expect("Should claim")
        .expect("Should have patient");
    assert_eq!(first.id, ids[0]);
    queue.complete(first.id).expect("Should complete");

    let stored = store
        .get_visit(first.id)
        .expect("Should load")
        .expect("Should exist");
    assert_eq!(stored.status, VisitStatus::Completed);

    let remaining: Vec<RecordId> = queue
        .list_queue()
        .expect("Should list")
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(remaining, vec![ids[1]]);
}
