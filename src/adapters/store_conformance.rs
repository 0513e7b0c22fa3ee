//! Behaviour every `PatientStore` implementation must share.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{PatientRecord, QueueEntry, RecordId, RiskAssessment, RiskLevel, VisitStatus};
use crate::ports::PatientStore;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .expect("Should build timestamp")
}

pub(crate) fn assessment(level: RiskLevel) -> RiskAssessment {
    RiskAssessment {
        risk_level: level,
        confidence: 0.8,
        overridden: false,
        override_reason: None,
        attributions: [("Age".to_string(), 0.25)].into_iter().collect(),
        department: "General Medicine".into(),
        diagnosis: "General Clinical Condition".into(),
        specialist: "General Physician".into(),
        treatment: vec!["Clinical Observation".into()],
        insights: vec!["Age increased risk (Impact: 0.25)".into()],
        model_fingerprint: "0011223344556677".into(),
    }
}

/// Insert a visit with the given label, arriving `minute` minutes after 08:00.
pub(crate) fn admit<S: PatientStore>(store: &S, label: &str, minute: i64) -> QueueEntry
where
    S::Error: std::fmt::Debug,
{
    let level = label.parse().unwrap_or(RiskLevel::Low);
    let record = PatientRecord {
        age: 30 + minute as u32,
        gender: "Female".into(),
        symptom: "Fever".into(),
        user_id: Some(minute % 2),
        ..Default::default()
    };
    store
        .insert_visit(&record, &assessment(level), base_time() + Duration::minutes(minute))
        .expect("Should insert")
}

pub(crate) fn insert_and_get<S: PatientStore>(store: &S)
where
    S::Error: std::fmt::Debug,
{
    let entry = admit(store, "High", 3);
    assert_eq!(entry.status, VisitStatus::Waiting);
    assert_eq!(entry.risk_label, "High");

    let loaded = store
        .get_visit(entry.id)
        .expect("Should load")
        .expect("Should exist");
    assert_eq!(loaded, entry);
    assert!(store.get_visit(RecordId(9999)).expect("Should load").is_none());
}

pub(crate) fn status_filter_in_arrival_order<S: PatientStore>(store: &S)
where
    S::Error: std::fmt::Debug,
{
    let late = admit(store, "Low", 10);
    let early = admit(store, "High", 1);
    let middle = admit(store, "Medium", 5);

    assert!(store
        .transition_status(middle.id, VisitStatus::Waiting, VisitStatus::Consulting)
        .expect("Should update"));

    let waiting = store
        .visits_with_status(VisitStatus::Waiting)
        .expect("Should query");
    let ids: Vec<RecordId> = waiting.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let consulting = store
        .visits_with_status(VisitStatus::Consulting)
        .expect("Should query");
    assert_eq!(consulting.len(), 1);
    assert_eq!(consulting[0].id, middle.id);
}

pub(crate) fn transition_is_compare_and_set<S: PatientStore>(store: &S)
where
    S::Error: std::fmt::Debug,
{
    let entry = admit(store, "Medium", 0);

    assert!(store
        .transition_status(entry.id, VisitStatus::Waiting, VisitStatus::Consulting)
        .expect("Should update"));
    assert!(!store
        .transition_status(entry.id, VisitStatus::Waiting, VisitStatus::Consulting)
        .expect("Should update"));
    assert!(!store
        .transition_status(RecordId(4242), VisitStatus::Waiting, VisitStatus::Consulting)
        .expect("Should update"));

    let loaded = store
        .get_visit(entry.id)
        .expect("Should load")
        .expect("Should exist");
    assert_eq!(loaded.status, VisitStatus::Consulting);
}

pub(crate) fn recent_and_user_history<S: PatientStore>(store: &S)
where
    S::Error: std::fmt::Debug,
{
    for minute in 0..5 {
        admit(store, "Low", minute);
    }
    assert_eq!(store.count_visits().expect("Should count"), 5);

    let recent = store.recent_visits(2).expect("Should query");
    let ages: Vec<u32> = recent.iter().map(|e| e.record.age).collect();
    assert_eq!(ages, vec![34, 33]);

    // user 1 arrived at minutes 1 and 3
    let history = store.visits_for_user(1).expect("Should query");
    let ages: Vec<u32> = history.iter().map(|e| e.record.age).collect();
    assert_eq!(ages, vec![33, 31]);
    assert!(store.visits_for_user(77).expect("Should query").is_empty());
}
