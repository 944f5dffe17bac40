use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Mri,
    Xray,
    Bloodwork,
    Ekg,
    Ct,
    Ultrasound,
    Report,
}

/// A patient report from the record store. `relevance_score` is only
/// meaningful on values returned from ranking; catalogue entries carry 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFetchedReport {
    pub id: String,
    pub filename: String,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub date: NaiveDate,
    pub tags: Vec<String>,
    #[serde(default)]
    pub relevance_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}
