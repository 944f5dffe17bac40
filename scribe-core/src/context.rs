//! Clinical context extraction
//!
//! Maps the accumulated transcript onto fixed symptom and test keyword
//! families. Each family yields at most one tag per pass; the number of
//! distinct keywords that hit a family ranks it for the dominant context.
//! Every call rescans the full text — there is no incremental state.

use chrono::{DateTime, Utc};

use crate::models::{ClinicalTag, ContextFrame, TagCategory, Utterance};

/// Confidence assigned to every keyword-derived tag.
pub const KEYWORD_TAG_CONFIDENCE: f32 = 0.85;

/// Maximum number of entries in `ContextFrame::dominant_context`.
pub const MAX_DOMINANT_TAGS: usize = 5;

type KeywordFamily = (&'static str, &'static [&'static str]);

const SYMPTOM_KEYWORDS: &[KeywordFamily] = &[
    ("headache", &["headache", "migraine", "head pain", "temple pain"]),
    ("chest_pain", &["chest pain", "chest discomfort", "heart pain", "angina"]),
    ("blood_pressure", &["blood pressure", "hypertension", "bp", "pressure"]),
    ("diabetes", &["blood sugar", "glucose", "diabetes", "sugar level"]),
    (
        "respiratory",
        &["cough", "breathing", "shortness of breath", "asthma", "wheezing"],
    ),
    ("stomach", &["stomach", "abdominal", "nausea", "vomiting", "pain"]),
    ("fever", &["fever", "temperature", "chills", "hot"]),
    ("allergy", &["allergy", "allergic", "itch", "rash", "rhinitis"]),
];

const TEST_KEYWORDS: &[KeywordFamily] = &[
    ("mri", &["mri", "magnetic resonance", "scan", "imaging"]),
    ("xray", &["x-ray", "xray", "radiograph", "chest x"]),
    (
        "bloodwork",
        &["blood", "cbc", "complete blood count", "lipid", "glucose test"],
    ),
    ("ekg", &["ekg", "ecg", "electrocardiogram", "heart rhythm"]),
    ("ct", &["ct scan", "computed tomography", "cat scan"]),
    ("ultrasound", &["ultrasound", "sonogram", "echo"]),
];

/// A tag together with the number of distinct keywords that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEvidence {
    pub tag: ClinicalTag,
    pub hits: usize,
}

fn scan_families(
    lower: &str,
    families: &[KeywordFamily],
    category: TagCategory,
    out: &mut Vec<TagEvidence>,
) {
    for (canonical, keywords) in families {
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        if hits == 0 {
            continue;
        }
        if out.iter().any(|e| e.tag.value == *canonical) {
            continue;
        }
        out.push(TagEvidence {
            tag: ClinicalTag {
                category,
                value: (*canonical).to_string(),
                confidence: KEYWORD_TAG_CONFIDENCE,
            },
            hits,
        });
    }
}

/// Scan text for every keyword family, symptoms first, in table order.
pub fn scan_clinical_evidence(text: &str) -> Vec<TagEvidence> {
    let lower = text.to_lowercase();
    let mut evidence = Vec::new();
    scan_families(&lower, SYMPTOM_KEYWORDS, TagCategory::Symptom, &mut evidence);
    scan_families(&lower, TEST_KEYWORDS, TagCategory::Test, &mut evidence);
    evidence
}

/// Extract deduplicated clinical tags from transcript text.
pub fn extract_clinical_context(text: &str) -> Vec<ClinicalTag> {
    scan_clinical_evidence(text)
        .into_iter()
        .map(|e| e.tag)
        .collect()
}

/// Rank tag values by keyword hits (descending, table order on ties), top 5.
pub fn dominant_context(evidence: &[TagEvidence]) -> Vec<String> {
    let mut ranked: Vec<&TagEvidence> = evidence.iter().collect();
    ranked.sort_by(|a, b| b.hits.cmp(&a.hits));
    ranked
        .into_iter()
        .take(MAX_DOMINANT_TAGS)
        .map(|e| e.tag.value.clone())
        .collect()
}

/// Build a context frame from the whole transcript so far.
pub fn build_context_frame(utterances: &[Utterance], timestamp: DateTime<Utc>) -> ContextFrame {
    let raw = utterances
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let evidence = scan_clinical_evidence(&raw);
    let dominant = dominant_context(&evidence);

    ContextFrame {
        timestamp,
        tags: evidence.into_iter().map(|e| e.tag).collect(),
        dominant_context: dominant,
        raw,
    }
}
