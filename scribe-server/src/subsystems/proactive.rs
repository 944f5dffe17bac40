//! Proactive suggestion loop — anticipates which report the doctor will ask for
//!
//! On every transcript update the clinical context is rebuilt. The first
//! time the context has dominant tags, the report catalogue is fetched and
//! ranked in the background; the top-ranked report becomes the suggestion.
//! When the doctor later asks to see "the reports", the request is resolved
//! against what was pre-fetched.
//!
//! Fetches run in `tokio::spawn` and never block the caller. Each fetch is
//! stamped with a generation number; a result is applied only if no newer
//! fetch was launched in the meantime.

use std::sync::Arc;

use chrono::Utc;
use scribe_core::catalogue::ReportStore;
use scribe_core::context::build_context_frame;
use scribe_core::models::{ContextFrame, PreFetchedReport, Utterance};
use scribe_core::ranking::{detect_report_intent, rank_reports, resolve_report_request};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    #[default]
    Idle,
    Listening,
    SuggestionReady,
    Displayed,
    Dismissed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentState {
    pub context_frames: Vec<ContextFrame>,
    pub prefetched_reports: Vec<PreFetchedReport>,
    pub current_dominant_tags: Vec<String>,
    pub most_likely_report: Option<PreFetchedReport>,
    pub surfaced_report: Option<PreFetchedReport>,
    pub last_intent: Option<String>,
    pub phase: AgentPhase,
    pub fetch_generation: u64,
}

/// One agent per consultation session.
#[derive(Clone)]
pub struct ProactiveAgent {
    store: Arc<dyn ReportStore>,
    patient_id: String,
    state: Arc<Mutex<AgentState>>,
}

impl ProactiveAgent {
    pub fn new(store: Arc<dyn ReportStore>, patient_id: impl Into<String>) -> Self {
        Self {
            store,
            patient_id: patient_id.into(),
            state: Arc::new(Mutex::new(AgentState::default())),
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Rebuild the context from the full transcript. Returns the handle of
    /// the background fetch when one was launched.
    pub async fn on_transcript_update(&self, utterances: &[Utterance]) -> Option<JoinHandle<()>> {
        let frame = build_context_frame(utterances, Utc::now());

        let (generation, tags) = {
            let mut state = self.state.lock().await;
            state.current_dominant_tags = frame.dominant_context.clone();
            state.context_frames.push(frame);
            if state.phase == AgentPhase::Idle {
                state.phase = AgentPhase::Listening;
            }

            if state.current_dominant_tags.is_empty() || !state.prefetched_reports.is_empty() {
                return None;
            }
            state.fetch_generation += 1;
            (state.fetch_generation, state.current_dominant_tags.clone())
        };

        tracing::debug!(
            patient_id = %self.patient_id,
            generation = generation,
            tags = ?tags,
            "Launching report pre-fetch"
        );

        let agent = self.clone();
        Some(tokio::spawn(async move {
            let ranked = agent.fetch_ranked(&tags).await;
            agent.apply_fetch(generation, ranked).await;
        }))
    }

    async fn apply_fetch(&self, generation: u64, ranked: Vec<PreFetchedReport>) {
        let mut state = self.state.lock().await;
        if state.fetch_generation != generation {
            tracing::debug!(
                generation = generation,
                current = state.fetch_generation,
                "Discarding stale report fetch"
            );
            return;
        }

        state.most_likely_report = ranked.first().cloned();
        state.prefetched_reports = ranked;

        if state.most_likely_report.is_some()
            && matches!(state.phase, AgentPhase::Idle | AgentPhase::Listening)
        {
            state.phase = AgentPhase::SuggestionReady;
        }

        tracing::info!(
            patient_id = %self.patient_id,
            count = state.prefetched_reports.len(),
            top = ?state.most_likely_report.as_ref().map(|r| r.id.as_str()),
            "Reports pre-fetched"
        );
    }

    /// Fetch and rank; store failures are logged and yield nothing.
    async fn fetch_ranked(&self, tags: &[String]) -> Vec<PreFetchedReport> {
        match self.store.fetch_catalogue(&self.patient_id, tags).await {
            Ok(catalogue) => rank_reports(&catalogue, tags),
            Err(e) => {
                tracing::warn!(store = self.store.name(), error = %e, "Report fetch failed");
                Vec::new()
            }
        }
    }

    /// Handle a doctor utterance that may be a request to see a report.
    /// Returns the surfaced report, or `None` when the speech is not a
    /// request or nothing matches.
    pub async fn handle_doctor_intent(&self, speech: &str) -> Option<PreFetchedReport> {
        if !detect_report_intent(speech) {
            return None;
        }

        let (prefetched, dominant) = {
            let state = self.state.lock().await;
            (state.prefetched_reports.clone(), state.current_dominant_tags.clone())
        };

        let candidates = if prefetched.is_empty() {
            self.fetch_ranked(&dominant).await
        } else {
            prefetched
        };

        let report = resolve_report_request(speech, &candidates, &dominant)?;

        let mut state = self.state.lock().await;
        state.last_intent = Some(speech.to_string());
        state.surfaced_report = Some(report.clone());
        state.phase = AgentPhase::Displayed;

        tracing::info!(report_id = %report.id, "Report surfaced on request");
        Some(report)
    }

    /// Show the pending suggestion.
    pub async fn display_suggestion(&self) -> Option<PreFetchedReport> {
        let mut state = self.state.lock().await;
        if state.phase != AgentPhase::SuggestionReady {
            return None;
        }
        state.surfaced_report = state.most_likely_report.clone();
        state.phase = AgentPhase::Displayed;
        state.surfaced_report.clone()
    }

    pub async fn dismiss_suggestion(&self) {
        let mut state = self.state.lock().await;
        if matches!(state.phase, AgentPhase::SuggestionReady | AgentPhase::Displayed) {
            state.surfaced_report = None;
            state.phase = AgentPhase::Dismissed;
        }
    }

    pub async fn snapshot(&self) -> AgentState {
        self.state.lock().await.clone()
    }
}
