use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Prescription,
    Referral,
    LabOrder,
    PharmacyOrder,
    Scheduling,
    /// Anything else a planning provider returned. Fails at execution time.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Prescription => "prescription",
            TaskKind::Referral => "referral",
            TaskKind::LabOrder => "lab_order",
            TaskKind::PharmacyOrder => "pharmacy_order",
            TaskKind::Scheduling => "scheduling",
            TaskKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl TaskKind {
    /// Map a wire type name to a kind; anything unrecognised is `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        match name.trim() {
            "prescription" => TaskKind::Prescription,
            "referral" => TaskKind::Referral,
            "lab_order" => TaskKind::LabOrder,
            "pharmacy_order" => TaskKind::PharmacyOrder,
            "scheduling" => TaskKind::Scheduling,
            _ => TaskKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One discrete clinical follow-up action derived from a consultation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Type name as the planner received it, kept only for `Unknown` tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_type: Option<String>,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub details: Map<String, Value>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowTask {
    pub fn pending(
        index: usize,
        kind: TaskKind,
        description: impl Into<String>,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            id: format!("task-{}", index + 1),
            kind,
            requested_type: None,
            description: description.into(),
            details,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Build a pending task from a wire type name, remembering the name
    /// when it does not map to a known kind.
    pub fn from_wire(
        index: usize,
        type_name: &str,
        description: impl Into<String>,
        details: Map<String, Value>,
    ) -> Self {
        let kind = TaskKind::from_wire(type_name);
        let mut task = Self::pending(index, kind, description, details);
        if kind == TaskKind::Unknown {
            task.requested_type = Some(type_name.to_string());
        }
        task
    }

    /// Name used when reporting this task's type.
    pub fn type_name(&self) -> String {
        match &self.requested_type {
            Some(name) if self.kind == TaskKind::Unknown => name.clone(),
            _ => self.kind.to_string(),
        }
    }

    /// String detail lookup; `None` when absent or not a string.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// String-array detail lookup; non-string items are skipped.
    pub fn detail_list(&self, key: &str) -> Option<Vec<String>> {
        self.details.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub reasoning: String,
    pub tasks: Vec<WorkflowTask>,
    pub estimated_duration_ms: u64,
}

/// Aggregate view of one workflow run. Read-only once `is_executing` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionState {
    pub run_id: Uuid,
    pub patient_id: String,
    pub is_executing: bool,
    pub current_task_index: usize,
    pub tasks: Vec<WorkflowTask>,
    pub completed_count: usize,
    pub failed_count: usize,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl WorkflowExecutionState {
    /// Start a run from a plan. Every task is reset to `pending`.
    pub fn start(plan: &WorkflowPlan, patient_id: &str) -> Self {
        let tasks = plan
            .tasks
            .iter()
            .cloned()
            .map(|mut t| {
                t.status = TaskStatus::Pending;
                t.result = None;
                t.error = None;
                t.started_at = None;
                t.finished_at = None;
                t
            })
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            is_executing: true,
            current_task_index: 0,
            tasks,
            completed_count: 0,
            failed_count: 0,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}
