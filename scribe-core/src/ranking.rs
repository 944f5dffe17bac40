//! Report relevance ranking and spoken-intent resolution
//!
//! Scoring is symmetric, case-insensitive substring containment between
//! each clinical tag and each report tag (`headache` matches
//! `migraine_headache` and vice versa). Ranking is a stable sort, so equal
//! scores keep catalogue order.

use crate::models::PreFetchedReport;

/// Verbs that mark an utterance as an explicit request to see a report.
const INTENT_KEYWORDS: &[&str] = &[
    "show",
    "see",
    "check",
    "look at",
    "pull up",
    "display",
    "get",
    "fetch",
    "retrieve",
    "review",
    "examine",
];

/// Count (clinical tag, report tag) pairs where either contains the other.
/// An empty clinical tag is contained in every report tag.
pub fn relevance_score(report_tags: &[String], clinical_tags: &[String]) -> u32 {
    let report_lower: Vec<String> = report_tags.iter().map(|t| t.to_lowercase()).collect();

    let mut score = 0;
    for tag in clinical_tags {
        let tag = tag.to_lowercase();
        for report_tag in &report_lower {
            if report_tag.contains(&tag) || tag.contains(report_tag.as_str()) {
                score += 1;
            }
        }
    }
    score
}

/// Score every report against the tags, drop zero scores, and sort by
/// score descending. Returned reports carry their `relevance_score`.
pub fn rank_reports(catalogue: &[PreFetchedReport], clinical_tags: &[String]) -> Vec<PreFetchedReport> {
    let mut ranked: Vec<PreFetchedReport> = catalogue
        .iter()
        .filter_map(|report| {
            let score = relevance_score(&report.tags, clinical_tags);
            (score > 0).then(|| PreFetchedReport {
                relevance_score: score,
                ..report.clone()
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    ranked
}

/// True when the utterance contains one of the report-request verbs.
pub fn detect_report_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    INTENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Pick the report a vague request ("let's see the reports") refers to.
///
/// The request text itself is not inspected; the choice is made from the
/// ranked candidates and the current dominant context:
/// - no candidates → `None`
/// - one candidate → that candidate
/// - otherwise the first candidate with a tag containing a dominant tag,
///   falling back to the top-ranked candidate
pub fn resolve_report_request(
    request: &str,
    ranked: &[PreFetchedReport],
    dominant_context: &[String],
) -> Option<PreFetchedReport> {
    let resolved = match ranked {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            let context: Vec<String> = dominant_context
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.trim().is_empty())
                .collect();

            ranked
                .iter()
                .find(|report| {
                    report.tags.iter().any(|report_tag| {
                        let report_tag = report_tag.to_lowercase();
                        context.iter().any(|tag| report_tag.contains(tag.as_str()))
                    })
                })
                .or_else(|| ranked.first())
                .cloned()
        }
    };

    tracing::debug!(
        request = %request.chars().take(50).collect::<String>(),
        candidates = ranked.len(),
        resolved = ?resolved.as_ref().map(|r| r.id.as_str()),
        "Resolved report request"
    );

    resolved
}
