//! Department recommendation knowledge table.
//!
//! Keyed by (symptom, risk level). Every pair yields a recommendation:
//! 1. exact (symptom, level) entry;
//! 2. `High` for a symptom the table does not know → emergency care;
//! 3. anything else → general medicine.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::assessment::{Recommendation, RiskLevel};

#[derive(Debug, Clone, Copy)]
struct Entry {
    department: &'static str,
    diagnosis: &'static str,
    specialist: &'static str,
    treatment: &'static [&'static str],
}

impl Entry {
    fn to_recommendation(self) -> Recommendation {
        Recommendation {
            department: self.department.to_string(),
            diagnosis: self.diagnosis.to_string(),
            specialist: self.specialist.to_string(),
            treatment: self.treatment.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

const EMERGENCY_FALLBACK: Entry = Entry {
    department: "Emergency & Critical Care",
    diagnosis: "Severe Clinical Condition",
    specialist: "Emergency Physician",
    treatment: &["Immediate Stabilization", "Critical Vitals Monitoring"],
};

const GENERAL_FALLBACK: Entry = Entry {
    department: "General Medicine",
    diagnosis: "General Clinical Condition",
    specialist: "General Physician",
    treatment: &["Clinical Observation", "Diagnostic Tests"],
};

type KnowledgeTable = BTreeMap<&'static str, BTreeMap<RiskLevel, Entry>>;

#[rustfmt::skip]
const KNOWLEDGE: &[(&str, RiskLevel, Entry)] = &[
    ("Chest Pain", RiskLevel::High, Entry { department: "Cardiology (ER)", diagnosis: "Acute Coronary Syndrome", specialist: "Senior Cardiologist", treatment: &["ECG Monitoring", "Troponin Test", "Aspirin"] }),
    ("Chest Pain", RiskLevel::Medium, Entry { department: "Cardiology", diagnosis: "Stable Angina / Pericarditis", specialist: "Cardiology Specialist", treatment: &["Stress Test", "BP Monitoring", "Follow-up"] }),
    ("Chest Pain", RiskLevel::Low, Entry { department: "General Medicine", diagnosis: "Musculoskeletal Pain", specialist: "General Physician", treatment: &["Observation", "Pain Relief"] }),

    ("Fever", RiskLevel::High, Entry { department: "Emergency Care", diagnosis: "Systemic Sepsis", specialist: "Emergency Physician", treatment: &["IV Fluids", "Blood Cultures", "IV Antibiotics"] }),
    ("Fever", RiskLevel::Medium, Entry { department: "Internal Medicine", diagnosis: "Community Acquired Pneumonia", specialist: "Internal Medicine Specialist", treatment: &["Oral Antibiotics", "Hydration", "X-Ray"] }),
    ("Fever", RiskLevel::Low, Entry { department: "General Medicine", diagnosis: "Viral Syndrome", specialist: "General Physician", treatment: &["Antipyretics", "Rest", "Fluids"] }),

    ("Cough", RiskLevel::High, Entry { department: "Pulmonology (ER)", diagnosis: "Acute Respiratory Distress", specialist: "Pulmonology Chief", treatment: &["O2 Therapy", "Nebulization", "Chest CT"] }),
    ("Cough", RiskLevel::Medium, Entry { department: "Pulmonology", diagnosis: "Bronchitis / Asthma Flare", specialist: "Pulmonology Specialist", treatment: &["Inhalers", "Steroids", "Pulse Oximetry"] }),
    ("Cough", RiskLevel::Low, Entry { department: "General Medicine", diagnosis: "Upper Respiratory Infection", specialist: "General Physician", treatment: &["Steam Inhalation", "Cough Syrup"] }),

    ("Abdominal Pain", RiskLevel::High, Entry { department: "Surgery (ER)", diagnosis: "Acute Appendicitis / Perforation", specialist: "Emergency Surgeon", treatment: &["NPO Status", "Abdominal CT", "Surgical Consult"] }),
    ("Abdominal Pain", RiskLevel::Medium, Entry { department: "Gastroenterology", diagnosis: "Gastroenteritis", specialist: "Gastroenterology Specialist", treatment: &["IV Fluids", "Stool Analysis", "Antispasmodics"] }),
    ("Abdominal Pain", RiskLevel::Low, Entry { department: "General Medicine", diagnosis: "Indigestion / Gastritis", specialist: "General Physician", treatment: &["Antacids", "Dietary Modification"] }),

    ("Numbness", RiskLevel::High, Entry { department: "Neurology (ER)", diagnosis: "Acute Ischemic Stroke", specialist: "Stroke Neurology Chief", treatment: &["NIH Stroke Scale", "Brain MRI", "TPA Eligibility"] }),
    ("Numbness", RiskLevel::Medium, Entry { department: "Neurology", diagnosis: "Peripheral Neuropathy", specialist: "Neurology Specialist", treatment: &["Nerve Conduction Test", "B12 Screen"] }),
    ("Numbness", RiskLevel::Low, Entry { department: "Orthopedics", diagnosis: "Pinched Nerve", specialist: "Orthopedic Surgeon", treatment: &["Physical Therapy", "Observation"] }),

    ("Breathlessness", RiskLevel::High, Entry { department: "Critical Care", diagnosis: "Pulmonary Embolism / Acute CHF", specialist: "Critical Care Chief", treatment: &["Anticoagulation", "Diuretics", "Echogram"] }),
    ("Breathlessness", RiskLevel::Medium, Entry { department: "Pulmonology", diagnosis: "COPD Exacerbation", specialist: "Pulmonology Specialist", treatment: &["Bronchodilators", "Steroids"] }),
    ("Breathlessness", RiskLevel::Low, Entry { department: "General Medicine", diagnosis: "Anxiety / Mild Asthma", specialist: "General Physician", treatment: &["Breathing Exercises", "Salbutamol"] }),
];

fn table() -> &'static KnowledgeTable {
    static TABLE: OnceLock<KnowledgeTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = KnowledgeTable::new();
        for (symptom, level, entry) in KNOWLEDGE {
            table.entry(*symptom).or_default().insert(*level, *entry);
        }
        table
    })
}

/// Symptoms with dedicated table entries.
pub fn known_symptoms() -> impl Iterator<Item = &'static str> {
    table().keys().copied()
}

/// Look up the recommendation for a symptom at a given (final) risk level.
#[must_use]
pub fn recommend(symptom: &str, risk_level: RiskLevel) -> Recommendation {
    let entry = match table().get(symptom) {
        Some(levels) => levels.get(&risk_level).copied().unwrap_or(GENERAL_FALLBACK),
        None if risk_level == RiskLevel::High => EMERGENCY_FALLBACK,
        None => GENERAL_FALLBACK,
    };
    entry.to_recommendation()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let rec = recommend("Chest Pain", RiskLevel::High);
        assert_eq!(rec.department, "Cardiology (ER)");
        assert_eq!(rec.diagnosis, "Acute Coronary Syndrome");
        assert_eq!(rec.specialist, "Senior Cardiologist");
        assert_eq!(rec.treatment, vec!["ECG Monitoring", "Troponin Test", "Aspirin"]);
    }

    #[test]
    fn test_every_known_symptom_covers_every_level() {
        for symptom in known_symptoms() {
            for level in RiskLevel::ALL {
                let rec = recommend(symptom, level);
                assert_ne!(rec.diagnosis, GENERAL_FALLBACK.diagnosis, "{symptom} {level}");
            }
        }
        assert_eq!(known_symptoms().count(), 6);
    }

    #[test]
    fn test_unknown_symptom_high_goes_to_emergency() {
        let rec = recommend("Hiccups", RiskLevel::High);
        assert_eq!(rec.department, "Emergency & Critical Care");
        assert_eq!(rec.specialist, "Emergency Physician");
    }

    #[test]
    fn test_unknown_symptom_otherwise_general_medicine() {
        for level in [RiskLevel::Medium, RiskLevel::Low] {
            let rec = recommend("Hiccups", level);
            assert_eq!(rec.department, "General Medicine");
            assert_eq!(rec.diagnosis, "General Clinical Condition");
            assert_eq!(rec.treatment, vec!["Clinical Observation", "Diagnostic Tests"]);
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let rec = recommend("fever", RiskLevel::High);
        assert_eq!(rec.department, "Emergency & Critical Care");
    }
}
