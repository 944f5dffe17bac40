//! Report catalogue — the patient record store queried by the proactive agent
//!
//! The store hands back its full catalogue; ranking happens locally in
//! [`crate::ranking`]. `MockReportStore` serves the fixed demo catalogue.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ScribeError;
use crate::models::{PreFetchedReport, ReportType};

/// Abstraction over patient report stores.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Fetch the catalogue of reports available for a patient. `tags` is a
    /// hint for stores that can pre-filter; callers rank the result themselves.
    async fn fetch_catalogue(
        &self,
        patient_id: &str,
        tags: &[String],
    ) -> Result<Vec<PreFetchedReport>, ScribeError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Fixed in-memory catalogue used by the demo session screen.
#[derive(Debug, Clone)]
pub struct MockReportStore {
    reports: Vec<PreFetchedReport>,
}

impl Default for MockReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReportStore {
    pub fn new() -> Self {
        Self {
            reports: demo_catalogue(),
        }
    }

    /// A store serving the given reports instead of the demo catalogue.
    pub fn with_reports(reports: Vec<PreFetchedReport>) -> Self {
        Self { reports }
    }

    pub fn reports(&self) -> &[PreFetchedReport] {
        &self.reports
    }
}

#[async_trait]
impl ReportStore for MockReportStore {
    async fn fetch_catalogue(
        &self,
        patient_id: &str,
        tags: &[String],
    ) -> Result<Vec<PreFetchedReport>, ScribeError> {
        tracing::debug!(
            patient_id = patient_id,
            tags = ?tags,
            count = self.reports.len(),
            "Serving mock report catalogue"
        );
        Ok(self.reports.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn report(
    id: &str,
    filename: &str,
    title: &str,
    report_type: ReportType,
    (y, m, d): (i32, u32, u32),
    tags: &[&str],
    image: &str,
) -> PreFetchedReport {
    PreFetchedReport {
        id: id.to_string(),
        filename: filename.to_string(),
        title: title.to_string(),
        report_type,
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        relevance_score: 0,
        image_path: Some(format!("/assets/reports/{}", image)),
    }
}

/// The six-report demo catalogue, in catalogue order.
pub fn demo_catalogue() -> Vec<PreFetchedReport> {
    vec![
        report(
            "report_789",
            "report_789_mri_brain.pdf",
            "Brain MRI Scan",
            ReportType::Mri,
            (2025, 10, 15),
            &["headache", "migraine", "brain", "neuroimaging"],
            "brain_mri.jpg",
        ),
        report(
            "report_755",
            "report_755_bp_log.csv",
            "Blood Pressure Log",
            ReportType::Report,
            (2025, 11, 1),
            &["blood_pressure", "hypertension", "vital"],
            "bp_log.jpg",
        ),
        report(
            "report_722",
            "report_722_chest_xray.pdf",
            "Chest X-Ray",
            ReportType::Xray,
            (2025, 10, 20),
            &["chest_pain", "respiratory", "heart"],
            "chest_xray.jpg",
        ),
        report(
            "report_650",
            "report_650_bloodwork.pdf",
            "Complete Blood Count",
            ReportType::Bloodwork,
            (2025, 10, 25),
            &["bloodwork", "diabetes", "glucose", "fever"],
            "bloodwork.jpg",
        ),
        report(
            "report_600",
            "report_600_ekg.pdf",
            "ECG Report",
            ReportType::Ekg,
            (2025, 9, 30),
            &["chest_pain", "heart", "ekg"],
            "ekg.jpg",
        ),
        report(
            "report_500",
            "report_500_ct_abdomen.pdf",
            "CT Scan - Abdomen",
            ReportType::Ct,
            (2025, 9, 15),
            &["stomach", "abdominal", "ct"],
            "ct_abdomen.jpg",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalogue_shape() {
        let catalogue = demo_catalogue();
        assert_eq!(catalogue.len(), 6);
        assert_eq!(catalogue[0].id, "report_789");
        assert_eq!(catalogue[0].report_type, ReportType::Mri);
        assert!(catalogue.iter().all(|r| r.relevance_score == 0));
        assert_eq!(
            catalogue[1].date,
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_mock_store_returns_full_catalogue() {
        let store = MockReportStore::new();
        let reports = store
            .fetch_catalogue("patient_001", &["headache".to_string()])
            .await
            .unwrap();
        assert_eq!(reports.len(), 6);
        assert_eq!(store.name(), "mock");
    }

    #[test]
    fn test_report_type_serializes_as_type() {
        let json = serde_json::to_value(&demo_catalogue()[2]).unwrap();
        assert_eq!(json["type"], "xray");
        assert_eq!(json["date"], "2025-10-20");
    }
}
