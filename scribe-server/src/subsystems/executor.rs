//! Workflow executor — runs a plan's tasks one at a time against the clinical tools
//!
//! Tasks run strictly in plan order. The progress callback fires after every
//! status transition (pending → executing, executing → completed/failed),
//! each time with a full snapshot of the run. A task that fails is recorded
//! and the run moves on; nothing is retried.

use chrono::Utc;
use scribe_core::config::WorkflowConfig;
use scribe_core::models::{TaskKind, TaskStatus, WorkflowExecutionState, WorkflowPlan, WorkflowTask};

use super::tools::{ClinicalTools, PrescriptionOrder, ReferralOrder, ToolError, ToolReceipt};

/// Fallback for optional free-text details missing from a plan. Facility
/// and pharmacy fall back to the configured workflow defaults.
const UNSPECIFIED: &str = "unspecified";

/// Execute every task of `plan` in order for `patient_id`.
///
/// Returns the final state with `is_executing == false`,
/// `completed_count + failed_count == tasks.len()` and `end_time` set.
pub async fn execute_workflow<F>(
    plan: &WorkflowPlan,
    patient_id: &str,
    tools: &dyn ClinicalTools,
    config: &WorkflowConfig,
    mut on_progress: F,
) -> WorkflowExecutionState
where
    F: FnMut(&WorkflowExecutionState) + Send,
{
    let mut state = WorkflowExecutionState::start(plan, patient_id);

    tracing::info!(
        run_id = %state.run_id,
        patient_id = patient_id,
        tasks = state.tasks.len(),
        "Workflow execution started"
    );

    for index in 0..state.tasks.len() {
        state.current_task_index = index;

        let task = {
            let task = &mut state.tasks[index];
            task.status = TaskStatus::Executing;
            task.started_at = Some(Utc::now());
            task.clone()
        };
        on_progress(&state);

        let outcome = dispatch_task(&task, patient_id, tools, config).await;

        let task = &mut state.tasks[index];
        task.finished_at = Some(Utc::now());
        match outcome {
            Ok(receipt) => {
                tracing::info!(task_id = %task.id, kind = %task.kind, receipt = %receipt.id, "Task completed");
                task.status = TaskStatus::Completed;
                task.result = Some(receipt.message);
                state.completed_count += 1;
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, kind = %task.kind, error = %e, "Task failed");
                task.status = TaskStatus::Failed;
                task.error = Some(e.to_string());
                state.failed_count += 1;
            }
        }
        on_progress(&state);
    }

    state.is_executing = false;
    state.end_time = Some(Utc::now());

    tracing::info!(
        run_id = %state.run_id,
        completed = state.completed_count,
        failed = state.failed_count,
        "Workflow execution finished"
    );

    state
}

/// Route one task to its tool. Missing required details and unknown task
/// kinds fail the task without calling any tool.
async fn dispatch_task(
    task: &WorkflowTask,
    patient_id: &str,
    tools: &dyn ClinicalTools,
    config: &WorkflowConfig,
) -> Result<ToolReceipt, ToolError> {
    match task.kind {
        TaskKind::Prescription => {
            let order = PrescriptionOrder {
                medication: required_str(task, "medication")?,
                dosage: optional_str(task, "dosage", UNSPECIFIED),
                duration: optional_str(task, "duration", UNSPECIFIED),
            };
            tools.e_prescribe(patient_id, &order).await
        }
        TaskKind::Referral => {
            let order = ReferralOrder {
                doctor: required_str(task, "doctor")?,
                specialty: required_str(task, "specialty")?,
                reason: optional_str(task, "reason", UNSPECIFIED),
            };
            tools.generate_referral(patient_id, &order).await
        }
        TaskKind::LabOrder => {
            let tests = required_list(task, "tests")?;
            let facility = optional_str(task, "facility", &config.default_lab_facility);
            tools.order_labs(patient_id, &tests, &facility).await
        }
        TaskKind::PharmacyOrder => {
            let medications = required_list(task, "medications")?;
            let pharmacy = optional_str(task, "pharmacy", &config.default_pharmacy);
            tools.send_pharmacy_order(patient_id, &medications, &pharmacy).await
        }
        TaskKind::Scheduling => {
            let date = required_str(task, "date")?;
            tools.schedule_follow_up(patient_id, &date).await
        }
        TaskKind::Unknown => Err(ToolError::UnknownTaskType(task.type_name())),
    }
}

fn missing(task: &WorkflowTask, field: &str) -> ToolError {
    ToolError::MissingDetail {
        task_type: task.type_name(),
        field: field.to_string(),
    }
}

fn required_str(task: &WorkflowTask, field: &str) -> Result<String, ToolError> {
    task.detail_str(field)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| missing(task, field))
}

fn required_list(task: &WorkflowTask, field: &str) -> Result<Vec<String>, ToolError> {
    task.detail_list(field)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| missing(task, field))
}

fn optional_str(task: &WorkflowTask, field: &str, default: &str) -> String {
    task.detail_str(field)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}
