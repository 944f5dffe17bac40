pub mod clinical;
pub mod recommendation;
pub mod report;
pub mod utterance;
pub mod workflow;

pub use clinical::{ClinicalTag, ContextFrame, TagCategory};
pub use recommendation::{
    MedicationRecommendation, PatientInfo, PatientVitals, Recommendations, TestRecommendation,
};
pub use report::{PreFetchedReport, ReportType};
pub use utterance::{Speaker, Utterance};
pub use workflow::{
    TaskKind, TaskStatus, WorkflowExecutionState, WorkflowPlan, WorkflowTask,
};
