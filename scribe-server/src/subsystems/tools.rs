//! Clinical tools — the external systems a workflow task acts on
//!
//! `ClinicalTools` is the seam to e-prescribing, referral, lab, pharmacy and
//! scheduling systems. `MockClinicalTools` simulates each call with a fixed
//! latency and always succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scribe_core::config::ToolLatencyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{sleep, Duration};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Missing '{field}' in {task_type} task details")]
    MissingDetail { task_type: String, field: String },

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("{system} rejected the request: {message}")]
    Rejected { system: String, message: String },
}

/// Acknowledgement returned by an external clinical system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReceipt {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionOrder {
    pub medication: String,
    pub dosage: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralOrder {
    pub doctor: String,
    pub specialty: String,
    pub reason: String,
}

#[async_trait]
pub trait ClinicalTools: Send + Sync {
    async fn e_prescribe(
        &self,
        patient_id: &str,
        order: &PrescriptionOrder,
    ) -> Result<ToolReceipt, ToolError>;

    async fn generate_referral(
        &self,
        patient_id: &str,
        order: &ReferralOrder,
    ) -> Result<ToolReceipt, ToolError>;

    async fn order_labs(
        &self,
        patient_id: &str,
        tests: &[String],
        facility: &str,
    ) -> Result<ToolReceipt, ToolError>;

    async fn send_pharmacy_order(
        &self,
        patient_id: &str,
        medications: &[String],
        pharmacy: &str,
    ) -> Result<ToolReceipt, ToolError>;

    async fn schedule_follow_up(
        &self,
        patient_id: &str,
        date: &str,
    ) -> Result<ToolReceipt, ToolError>;
}

/// Simulated clinical systems with fixed per-tool latency.
#[derive(Debug, Clone, Default)]
pub struct MockClinicalTools {
    latency: ToolLatencyConfig,
}

impl MockClinicalTools {
    pub fn new(latency: ToolLatencyConfig) -> Self {
        Self { latency }
    }

    fn receipt(prefix: &str, message: String) -> ToolReceipt {
        let now = Utc::now();
        ToolReceipt {
            id: format!("{}-{}", prefix, now.timestamp_millis()),
            message,
            timestamp: now,
        }
    }
}

#[async_trait]
impl ClinicalTools for MockClinicalTools {
    async fn e_prescribe(
        &self,
        patient_id: &str,
        order: &PrescriptionOrder,
    ) -> Result<ToolReceipt, ToolError> {
        sleep(Duration::from_millis(self.latency.prescription_ms)).await;
        tracing::debug!(patient_id = patient_id, medication = %order.medication, "e-prescribe");
        Ok(Self::receipt(
            "RX",
            format!(
                "Prescription for {} {} sent to patient's pharmacy record. Duration: {}",
                order.medication, order.dosage, order.duration
            ),
        ))
    }

    async fn generate_referral(
        &self,
        patient_id: &str,
        order: &ReferralOrder,
    ) -> Result<ToolReceipt, ToolError> {
        sleep(Duration::from_millis(self.latency.referral_ms)).await;
        tracing::debug!(patient_id = patient_id, doctor = %order.doctor, "referral");
        Ok(Self::receipt(
            "REF",
            format!(
                "Referral letter generated and faxed to Dr. {} ({}). Reason: {}",
                order.doctor, order.specialty, order.reason
            ),
        ))
    }

    async fn order_labs(
        &self,
        patient_id: &str,
        tests: &[String],
        facility: &str,
    ) -> Result<ToolReceipt, ToolError> {
        sleep(Duration::from_millis(self.latency.lab_order_ms)).await;
        tracing::debug!(patient_id = patient_id, tests = tests.len(), "lab order");
        Ok(Self::receipt(
            "LAB",
            format!(
                "Lab orders for {} sent to {}. Patient notified.",
                tests.join(", "),
                facility
            ),
        ))
    }

    async fn send_pharmacy_order(
        &self,
        patient_id: &str,
        medications: &[String],
        pharmacy: &str,
    ) -> Result<ToolReceipt, ToolError> {
        sleep(Duration::from_millis(self.latency.pharmacy_order_ms)).await;
        tracing::debug!(patient_id = patient_id, medications = medications.len(), "pharmacy order");
        Ok(Self::receipt(
            "PHARM",
            format!(
                "Pharmacy order for {} sent to {}. Ready for pickup.",
                medications.join(", "),
                pharmacy
            ),
        ))
    }

    async fn schedule_follow_up(
        &self,
        patient_id: &str,
        date: &str,
    ) -> Result<ToolReceipt, ToolError> {
        sleep(Duration::from_millis(self.latency.scheduling_ms)).await;
        tracing::debug!(patient_id = patient_id, date = date, "follow-up");
        Ok(Self::receipt(
            "APT",
            format!(
                "Follow-up appointment scheduled for {}. Reminder sent to patient.",
                date
            ),
        ))
    }
}
