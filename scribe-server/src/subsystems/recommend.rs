//! Recommendation service — medication and test suggestions from live transcript
//!
//! Sends the recent transcript (and the patient profile, when known) to the
//! generative provider and parses a `{medications, tests}` object. Any
//! failure yields an empty result.

use scribe_core::generative::{parse_json_response, GenerationOptions, GenerativeProvider, ProviderError};
use scribe_core::models::{MedicationRecommendation, PatientInfo, Recommendations, TestRecommendation};
use serde::Deserialize;

/// Sampling for recommendations: more varied than planning.
pub fn recommend_generation_options(temperature: f32) -> GenerationOptions {
    GenerationOptions {
        temperature,
        top_p: Some(0.95),
        top_k: Some(40),
        max_output_tokens: Some(1024),
    }
}

/// Both keys are required; a response missing either is rejected.
#[derive(Debug, Deserialize)]
struct RawRecommendations {
    medications: Option<Vec<MedicationRecommendation>>,
    tests: Option<Vec<TestRecommendation>>,
}

/// Fetch recommendations, returning an empty result on any failure.
pub async fn fetch_recommendations(
    provider: Option<&dyn GenerativeProvider>,
    transcript_chunk: &str,
    patient_info: Option<&PatientInfo>,
    options: &GenerationOptions,
) -> Recommendations {
    match request_recommendations(provider, transcript_chunk, patient_info, options).await {
        Ok(recs) => {
            tracing::info!(
                medications = recs.medications.len(),
                tests = recs.tests.len(),
                "Recommendations received"
            );
            recs
        }
        Err(e) => {
            tracing::warn!(error = %e, "Recommendations unavailable, returning empty set");
            Recommendations::default()
        }
    }
}

pub async fn request_recommendations(
    provider: Option<&dyn GenerativeProvider>,
    transcript_chunk: &str,
    patient_info: Option<&PatientInfo>,
    options: &GenerationOptions,
) -> Result<Recommendations, ProviderError> {
    let provider = provider.ok_or(ProviderError::Unavailable)?;

    let prompt = build_recommendation_prompt(transcript_chunk, patient_info);
    let text = provider.generate(&prompt, options).await?;
    let raw: RawRecommendations = parse_json_response(&text)?;

    match (raw.medications, raw.tests) {
        (Some(medications), Some(tests)) => Ok(Recommendations { medications, tests }),
        _ => Err(ProviderError::MalformedJson(
            "response is missing 'medications' or 'tests'".to_string(),
        )),
    }
}

fn patient_profile(patient_info: Option<&PatientInfo>) -> String {
    let Some(info) = patient_info else {
        return "Not provided".to_string();
    };
    let vitals = info.vitals.clone().unwrap_or_default();
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "Unknown".to_string());

    format!(
        "- Age: {}\n- Medical History: {}\n- Blood Pressure: {}\n- Blood Sugar: {}\n- Weight: {}",
        info.age.map(|a| a.to_string()).unwrap_or_else(|| "Unknown".to_string()),
        info.past_diseases.clone().unwrap_or_else(|| "None".to_string()),
        or_unknown(vitals.bp),
        or_unknown(vitals.sugar_level),
        or_unknown(vitals.weight),
    )
}

fn build_recommendation_prompt(transcript_chunk: &str, patient_info: Option<&PatientInfo>) -> String {
    format!(
        r#"You are a medical reference assistant supporting clinical documentation. From the consultation transcript below, list the medications and diagnostic tests commonly documented for the symptoms being discussed. This is reference material for documentation, not medical advice.

Patient profile:
{profile}

Consultation transcript:
{transcript}

Typical references (adapt to the actual symptoms):
- Fever or headache: Paracetamol 500mg twice-daily, Ibuprofen 400mg as-needed
- Respiratory symptoms: Cetirizine 10mg once-daily, Ambroxol syrup thrice-daily
- Hypertension: Losartan, Amlodipine (when the vitals suggest it)
- Diabetes: Metformin (when the history suggests it)
- Tests: CBC, fasting blood sugar, lipid profile, thyroid panel, chest X-ray, ECG

Respond with JSON in this shape:
{{
    "medications": [
        {{"name": "generic name", "dosage": "e.g. 500mg", "frequency": "e.g. twice-daily", "reason": "indication"}}
    ],
    "tests": [
        {{"name": "test name", "reason": "purpose"}}
    ]
}}"#,
        profile = patient_profile(patient_info),
        transcript = transcript_chunk,
    )
}
