use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecommendation {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecommendation {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub medications: Vec<MedicationRecommendation>,
    pub tests: Vec<TestRecommendation>,
}

impl Recommendations {
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty() && self.tests.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientVitals {
    pub bp: Option<String>,
    pub sugar_level: Option<String>,
    pub weight: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub age: Option<u32>,
    pub past_diseases: Option<String>,
    pub vitals: Option<PatientVitals>,
}
