//! Workflow planner — turns an approved SOAP plan into discrete clinical tasks
//!
//! The generative provider is asked for a task list first. Any failure
//! (no provider, transport error, unparseable output) falls back to the
//! rule-based plan built from the selected medications and tests, so this
//! always returns a plan.

use chrono::{Duration, NaiveDate};
use scribe_core::config::WorkflowConfig;
use scribe_core::generative::{parse_json_response, GenerationOptions, GenerativeProvider, ProviderError};
use scribe_core::models::{PatientInfo, TaskKind, WorkflowPlan, WorkflowTask};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Per-task estimate used for both plan sources.
const TASK_ESTIMATE_MS: u64 = 2000;

/// Extra allowance on model-generated plans.
const PROVIDER_PLAN_OVERHEAD_MS: u64 = 1000;

const DEFAULT_REASONING: &str = "Clinical workflow analysis";
const RULE_BASED_REASONING: &str = "Standard clinical workflow based on medications and tests";

/// Sampling for plan generation: low temperature for structured output.
pub fn plan_generation_options(temperature: f32) -> GenerationOptions {
    GenerationOptions {
        temperature,
        top_p: Some(0.9),
        ..GenerationOptions::default()
    }
}

/// What the clinician approved at the end of a consultation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub plan_text: String,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
}

#[derive(Debug, Deserialize)]
struct ProviderPlan {
    #[serde(default)]
    reasoning: Option<String>,
    tasks: Vec<ProviderTask>,
}

#[derive(Debug, Deserialize)]
struct ProviderTask {
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    details: Option<Map<String, Value>>,
}

/// Produce a workflow plan, preferring the provider and falling back to
/// [`rule_based_plan`] on any provider failure.
pub async fn plan_workflow(
    provider: Option<&dyn GenerativeProvider>,
    request: &PlanRequest,
    config: &WorkflowConfig,
    options: &GenerationOptions,
    today: NaiveDate,
) -> WorkflowPlan {
    request_provider_plan(provider, request, options)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Provider plan unavailable, using rule-based plan");
            rule_based_plan(request, config, today)
        })
}

/// Ask the provider for a plan. `Unavailable` when no provider is configured.
pub async fn request_provider_plan(
    provider: Option<&dyn GenerativeProvider>,
    request: &PlanRequest,
    options: &GenerationOptions,
) -> Result<WorkflowPlan, ProviderError> {
    let provider = provider.ok_or(ProviderError::Unavailable)?;

    let text = provider.generate(&build_plan_prompt(request), options).await?;
    let parsed: ProviderPlan = parse_json_response(&text)?;

    let tasks: Vec<WorkflowTask> = parsed
        .tasks
        .into_iter()
        .enumerate()
        .map(|(i, t)| {
            WorkflowTask::from_wire(i, &t.type_name, t.description, t.details.unwrap_or_default())
        })
        .collect();

    let reasoning = parsed
        .reasoning
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REASONING.to_string());

    tracing::info!(
        provider = provider.name(),
        tasks = tasks.len(),
        "Provider workflow plan parsed"
    );

    Ok(WorkflowPlan {
        reasoning,
        estimated_duration_ms: tasks.len() as u64 * TASK_ESTIMATE_MS + PROVIDER_PLAN_OVERHEAD_MS,
        tasks,
    })
}

/// Deterministic plan: a prescription per medication, one pharmacy order
/// for all medications, one lab order for all tests, and a follow-up visit.
pub fn rule_based_plan(request: &PlanRequest, config: &WorkflowConfig, today: NaiveDate) -> WorkflowPlan {
    let mut tasks: Vec<WorkflowTask> = Vec::new();

    for medication in &request.medications {
        tasks.push(WorkflowTask::pending(
            tasks.len(),
            TaskKind::Prescription,
            format!("Prescription for {}", medication),
            object(json!({
                "medication": medication,
                "dosage": config.default_dosage,
                "duration": config.default_duration,
            })),
        ));
    }

    if !request.medications.is_empty() {
        tasks.push(WorkflowTask::pending(
            tasks.len(),
            TaskKind::PharmacyOrder,
            format!(
                "Send pharmacy order for {} medication(s)",
                request.medications.len()
            ),
            object(json!({
                "medications": request.medications,
                "pharmacy": config.default_pharmacy,
            })),
        ));
    }

    if !request.tests.is_empty() {
        tasks.push(WorkflowTask::pending(
            tasks.len(),
            TaskKind::LabOrder,
            format!("Order labs: {}", request.tests.join(", ")),
            object(json!({
                "tests": request.tests,
                "facility": config.default_lab_facility,
            })),
        ));
    }

    tasks.push(WorkflowTask::pending(
        tasks.len(),
        TaskKind::Scheduling,
        "Schedule follow-up appointment",
        object(json!({ "date": follow_up_date(today, config.follow_up_days) })),
    ));

    WorkflowPlan {
        reasoning: RULE_BASED_REASONING.to_string(),
        estimated_duration_ms: tasks.len() as u64 * TASK_ESTIMATE_MS,
        tasks,
    }
}

/// `today + days` as a long US date, e.g. "March 3, 2026".
pub fn follow_up_date(today: NaiveDate, days: i64) -> String {
    today
        .checked_add_signed(Duration::days(days))
        .unwrap_or(today)
        .format("%B %-d, %Y")
        .to_string()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn build_plan_prompt(request: &PlanRequest) -> String {
    format!(
        r#"You are a clinical workflow analyzer. Read the plan section of this SOAP note and list the actionable follow-up tasks.

Plan:
{plan}

Selected medications: {medications}
Selected tests: {tests}

Respond with JSON in exactly this shape:

{{
    "reasoning": "one or two sentences on why these tasks were chosen",
    "tasks": [
        {{
            "type": "prescription|referral|lab_order|pharmacy_order|scheduling",
            "description": "short description of the task",
            "details": {{
                "medication": "prescription only",
                "dosage": "prescription only",
                "duration": "prescription only",
                "doctor": "referral only",
                "specialty": "referral only",
                "tests": ["lab_order only"],
                "medications": ["pharmacy_order only"],
                "date": "scheduling only"
            }}
        }}
    ]
}}

Return only the JSON object with no markdown and no commentary."#,
        plan = request.plan_text,
        medications = request.medications.join(", "),
        tests = request.tests.join(", "),
    )
}
