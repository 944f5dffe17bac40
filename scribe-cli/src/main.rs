//! scribe-cli — command-line frontend for the Scribe session assistant
//!
//! Talks to a running `scribe-server` over HTTP.
//!
//! # Subcommands
//! - `classify <text> [--previous doctor|patient]` — label an utterance
//! - `reports <tag>... [--json]`                    — rank the report catalogue
//! - `status`                                       — show server health

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "scribe-cli",
    version,
    about = "Scribe clinical session assistant CLI"
)]
struct Cli {
    /// Scribe HTTP server URL (overrides SCRIBE_HTTP_URL env var)
    #[arg(long, env = "SCRIBE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Doctor,
    Patient,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Label an utterance as doctor or patient speech
    Classify {
        /// Utterance text
        text: String,

        /// Speaker of the previous utterance
        #[arg(long, value_enum)]
        previous: Option<Role>,
    },

    /// Rank the patient's reports against clinical tags
    Reports {
        /// Clinical tags, e.g. headache chest_pain
        #[arg(required = true)]
        tags: Vec<String>,

        /// Print the ranked reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show Scribe server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SpeakerResponse {
    pub speaker: String,
    pub scores: Option<SpeakerScores>,
}

#[derive(Debug, Deserialize)]
pub struct SpeakerScores {
    pub doctor: f64,
    pub patient: f64,
}

/// A ranked report as returned by POST /api/reports/rank
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankedReport {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub date: String,
    pub tags: Vec<String>,
    pub relevance_score: u32,
}

#[derive(Debug, Deserialize)]
pub struct RankResponse {
    pub reports: Vec<RankedReport>,
    pub count: usize,
}

/// One human-readable line per ranked report.
pub fn format_report_line(rank: usize, r: &RankedReport) -> String {
    format!(
        "{:>2}. {} [{}] {}  score {}  tags: {}",
        rank,
        r.title,
        r.report_type,
        r.date,
        r.relevance_score,
        r.tags.join(", ")
    )
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn post_json<T: for<'de> Deserialize<'de>>(
    server: &str,
    route: &str,
    body: &serde_json::Value,
) -> anyhow::Result<T> {
    let url = format!("{}{}", server, route);
    let resp = match client(30)?.post(&url).json(body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("scribe-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("scribe-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    Ok(resp.json()?)
}

/// Classify one utterance via POST /api/speaker.
fn do_classify(server: &str, text: &str, previous: Option<Role>) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "text": text,
        "previous_speaker": previous,
    });
    let resp: SpeakerResponse = post_json(server, "/api/speaker", &body)?;

    println!("{}", resp.speaker);
    if let Some(scores) = resp.scores {
        println!("  doctor:  {:.1}", scores.doctor);
        println!("  patient: {:.1}", scores.patient);
    }
    Ok(())
}

/// Rank the catalogue via POST /api/reports/rank.
fn do_reports(server: &str, tags: &[String], json_output: bool) -> anyhow::Result<()> {
    let body = serde_json::json!({ "tags": tags });
    let resp: RankResponse = post_json(server, "/api/reports/rank", &body)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp.reports)?);
        return Ok(());
    }

    if resp.count == 0 {
        eprintln!("No reports match: {}", tags.join(", "));
        return Ok(());
    }
    for (i, r) in resp.reports.iter().enumerate() {
        println!("{}", format_report_line(i + 1, r));
    }
    Ok(())
}

/// Show the server status by calling GET /api/health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            let ok = body["ok"].as_bool().unwrap_or(false);
            println!("Scribe server: {}", if ok { "ok" } else { "unknown" });
            println!("URL:           {}", server);
        }
        Ok(r) => {
            eprintln!("scribe-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("scribe-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Classify { text, previous } => do_classify(&server, &text, previous),
        Commands::Reports { tags, json } => do_reports(&server, &tags, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("scribe-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mri() -> RankedReport {
        RankedReport {
            id: "report_789".to_string(),
            title: "Brain MRI Scan".to_string(),
            report_type: "mri".to_string(),
            date: "2025-10-15".to_string(),
            tags: vec!["headache".to_string(), "migraine".to_string()],
            relevance_score: 2,
        }
    }

    #[test]
    fn test_report_line_format() {
        let line = format_report_line(1, &mri());
        assert_eq!(
            line,
            " 1. Brain MRI Scan [mri] 2025-10-15  score 2  tags: headache, migraine"
        );
    }

    #[test]
    fn test_rank_response_parses_server_shape() {
        let body = serde_json::json!({
            "count": 1,
            "reports": [{
                "id": "report_789",
                "filename": "report_789_mri_brain.pdf",
                "title": "Brain MRI Scan",
                "type": "mri",
                "date": "2025-10-15",
                "tags": ["headache", "migraine", "brain", "neuroimaging"],
                "relevance_score": 1,
                "image_path": "/assets/reports/brain_mri.jpg"
            }]
        });
        let resp: RankResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.count, 1);
        assert_eq!(resp.reports[0].report_type, "mri");
        assert_eq!(resp.reports[0].relevance_score, 1);
    }

    #[test]
    fn test_json_output_keeps_type_field() {
        let json = serde_json::to_value(vec![mri()]).unwrap();
        assert_eq!(json[0]["type"], "mri");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let body = serde_json::json!({ "previous_speaker": Some(Role::Patient) });
        assert_eq!(body["previous_speaker"], "patient");
        let none: Option<Role> = None;
        assert!(serde_json::json!({ "p": none })["p"].is_null());
    }

    #[test]
    fn test_cli_parses_reports_tags() {
        let cli = Cli::try_parse_from(["scribe-cli", "reports", "headache", "chest_pain", "--json"]).unwrap();
        match cli.command {
            Commands::Reports { tags, json } => {
                assert_eq!(tags, vec!["headache", "chest_pain"]);
                assert!(json);
            }
            _ => panic!("expected reports"),
        }
    }

    #[test]
    fn test_cli_parses_classify_previous() {
        let cli = Cli::try_parse_from(["scribe-cli", "classify", "I feel dizzy", "--previous", "doctor"])
            .unwrap();
        match cli.command {
            Commands::Classify { text, previous } => {
                assert_eq!(text, "I feel dizzy");
                assert_eq!(previous, Some(Role::Doctor));
            }
            _ => panic!("expected classify"),
        }
    }
}
