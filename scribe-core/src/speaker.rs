//! Speaker attribution — heuristic doctor/patient labelling
//!
//! Scores an utterance against two fixed phrase tables and a handful of
//! structural cues, then picks the higher-scoring role:
//! - +1 per doctor / patient phrase found as a substring
//! - +2 per medical term (doctor), +1.5 per personal pronoun (patient)
//! - +2 for a clinician-style or a self-referential question
//! - +1 to doctor for utterances over 100 characters
//! - +0.5 to the role opposite the previous speaker when scores are within 1
//!
//! Exact ties alternate from the previous speaker; with no previous speaker,
//! first-person phrasing means patient and everything else doctor.

use crate::models::Speaker;

const DOCTOR_PATTERNS: &[&str] = &[
    // Questions and examinations
    "can you",
    "how long",
    "any pain",
    "let me",
    "show me",
    "describe the",
    "rate your pain",
    "when did",
    "have you ever",
    "family history",
    "take a deep breath",
    "open your mouth",
    // Decisions and advice
    "i recommend",
    "we need to",
    "i'd like to",
    "i want to",
    "we should",
    "you should",
    "prescription",
    "medication",
    "treatment",
    "therapy",
    "surgery",
    // Terminology
    "diagnosis",
    "prognosis",
    "examination",
    "symptoms",
    "condition",
    "disease",
    "blood pressure",
    "heart rate",
    "temperature",
    "pulse",
    "blood test",
    "x-ray",
    "mri",
    "ct scan",
    "ultrasound",
    "lab results",
    "vital signs",
    // Professional language
    "based on your",
    "according to",
    "medical history",
    "clinical",
    "patient",
    "follow up",
    "appointment",
    "referral",
    "specialist",
];

const PATIENT_PATTERNS: &[&str] = &[
    // Experiences and feelings
    "i feel",
    "i'm feeling",
    "it hurts",
    "i have",
    "i've been",
    "i've had",
    "my pain",
    "my symptoms",
    "i can't",
    "i couldn't",
    "i'm unable",
    "it started",
    "since yesterday",
    "for the past",
    "i'm worried",
    "i'm concerned",
    // Symptom descriptions
    "sharp pain",
    "dull pain",
    "burning",
    "tingling",
    "numbness",
    "swelling",
    "headache",
    "nausea",
    "dizzy",
    "tired",
    "weak",
    "sore",
    "ache",
    // Personal context
    "at home",
    "at work",
    "when i",
    "i noticed",
    "i think",
    "i believe",
    "my family",
    "my job",
    "i work",
    "i live",
    "i usually",
    // Questions about their condition
    "what does this mean",
    "is this serious",
    "will i be okay",
    "how long",
    "what should i do",
    "can i",
    "is it normal",
    "what causes",
];

const MEDICAL_TERMS: &[&str] = &[
    "diagnosis",
    "prescription",
    "medication",
    "blood pressure",
    "heart rate",
];

const PERSONAL_PRONOUNS: &[&str] = &["i feel", "i have", "i'm", "my", "me"];

/// Openings of a clinician-style question (matched at the start of the text).
const CLINICIAN_QUESTION_OPENINGS: &[&str] = &[
    "how", "when", "where", "what", "why", "can you", "have you", "do you", "are you",
];

/// Self-referential question fragments (matched anywhere in the text).
const SELF_QUESTION_PATTERNS: &[&str] = &["what does", "is this", "will i", "should i", "can i"];

const MEDICAL_TERM_BONUS: f32 = 2.0;
const PRONOUN_BONUS: f32 = 1.5;
const QUESTION_BONUS: f32 = 2.0;
const LONG_UTTERANCE_CHARS: usize = 100;
const ALTERNATION_NUDGE: f32 = 0.5;

/// Final adjusted scores for one utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeakerScores {
    pub doctor: f32,
    pub patient: f32,
}

fn count_matches(text: &str, patterns: &[&str]) -> usize {
    patterns.iter().filter(|p| text.contains(*p)).count()
}

/// Compute the adjusted doctor/patient scores, including the alternation nudge.
pub fn score_utterance(text: &str, previous: Option<Speaker>) -> SpeakerScores {
    let lower = text.to_lowercase();

    let mut doctor = count_matches(&lower, DOCTOR_PATTERNS) as f32;
    let mut patient = count_matches(&lower, PATIENT_PATTERNS) as f32;

    doctor += count_matches(&lower, MEDICAL_TERMS) as f32 * MEDICAL_TERM_BONUS;
    patient += count_matches(&lower, PERSONAL_PRONOUNS) as f32 * PRONOUN_BONUS;

    if lower.contains('?') {
        if CLINICIAN_QUESTION_OPENINGS
            .iter()
            .any(|opening| lower.starts_with(opening))
        {
            doctor += QUESTION_BONUS;
        } else if SELF_QUESTION_PATTERNS.iter().any(|p| lower.contains(p)) {
            patient += QUESTION_BONUS;
        }
    }

    if text.chars().count() > LONG_UTTERANCE_CHARS {
        doctor += 1.0;
    }

    if let Some(prev) = previous {
        if (doctor - patient).abs() <= 1.0 {
            match prev {
                Speaker::Doctor => patient += ALTERNATION_NUDGE,
                Speaker::Patient => doctor += ALTERNATION_NUDGE,
            }
        }
    }

    SpeakerScores { doctor, patient }
}

/// Attribute an utterance to the doctor or the patient.
pub fn classify_speaker(text: &str, previous: Option<Speaker>) -> Speaker {
    let scores = score_utterance(text, previous);

    tracing::debug!(
        doctor_score = scores.doctor,
        patient_score = scores.patient,
        previous = ?previous,
        preview = %text.chars().take(50).collect::<String>(),
        "Speaker scores"
    );

    if scores.doctor > scores.patient {
        return Speaker::Doctor;
    }
    if scores.patient > scores.doctor {
        return Speaker::Patient;
    }

    if let Some(prev) = previous {
        return prev.other();
    }

    let lower = text.to_lowercase();
    if lower.starts_with("i ") || lower.contains(" i ") {
        Speaker::Patient
    } else {
        Speaker::Doctor
    }
}
