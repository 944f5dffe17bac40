use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Symptom,
    Condition,
    Medication,
    Test,
    Vital,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTag {
    pub category: TagCategory,
    pub value: String,
    pub confidence: f32,
}

/// Snapshot of the clinical context derived from the whole transcript at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<ClinicalTag>,
    pub dominant_context: Vec<String>,
    pub raw: String,
}
