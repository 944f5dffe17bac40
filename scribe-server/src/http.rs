//! Scribe HTTP REST API
//!
//! Axum-based HTTP server for the consultation screen: the speech-token
//! relay, speaker labelling, clinical context, report ranking,
//! recommendations, the workflow runner and per-session proactive agents.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - GET  /api/health                   — liveness
//! - GET  /api/assemblyai-token         — short-lived streaming token relay
//! - POST /api/speaker                  — classify one utterance
//! - POST /api/context                  — context frame for a transcript
//! - POST /api/reports/rank             — rank the catalogue against tags
//! - POST /api/recommendations          — medication / test suggestions
//! - POST /api/workflow                 — plan and execute follow-up tasks
//! - POST /api/sessions/:id/utterances  — append speech, run the proactive loop
//! - POST /api/sessions/:id/intent      — resolve a "show me the reports" request
//! - POST /api/sessions/:id/suggestion  — display or dismiss the suggestion
//! - GET  /api/sessions/:id             — proactive agent snapshot

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, Utc};
use scribe_core::catalogue::{MockReportStore, ReportStore};
use scribe_core::context::build_context_frame;
use scribe_core::generative::{GeminiClient, GenerativeProvider};
use scribe_core::models::{PatientInfo, Speaker, Utterance, WorkflowExecutionState};
use scribe_core::ranking::rank_reports;
use scribe_core::speaker::score_utterance;
use scribe_core::{classify_speaker, ScribeConfig, Transcript};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;

use crate::subsystems::executor::execute_workflow;
use crate::subsystems::planner::{plan_generation_options, plan_workflow, PlanRequest};
use crate::subsystems::proactive::ProactiveAgent;
use crate::subsystems::recommend::{fetch_recommendations, recommend_generation_options};
use crate::subsystems::tools::{ClinicalTools, MockClinicalTools};

/// One live consultation: its labelled transcript and proactive agent.
pub struct Session {
    pub transcript: Mutex<Transcript>,
    pub agent: ProactiveAgent,
}

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub config: ScribeConfig,
    pub provider: Option<Arc<dyn GenerativeProvider>>,
    pub store: Arc<dyn ReportStore>,
    pub tools: Arc<dyn ClinicalTools>,
    pub client: reqwest::Client,
    pub sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl HttpState {
    pub fn new(
        config: ScribeConfig,
        provider: Option<Arc<dyn GenerativeProvider>>,
        store: Arc<dyn ReportStore>,
        tools: Arc<dyn ClinicalTools>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            tools,
            client: reqwest::Client::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the default collaborators: Gemini when enabled and keyed, the
    /// demo report catalogue and the simulated clinical tools.
    pub fn from_config(config: ScribeConfig) -> Self {
        let provider: Option<Arc<dyn GenerativeProvider>> = if config.generative.enabled {
            match GeminiClient::from_config(&config.generative) {
                Ok(client) => {
                    tracing::info!(model = client.model(), "Generative provider ready");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!("Generative provider skipped, using rule-based fallbacks: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let tools = Arc::new(MockClinicalTools::new(config.workflow.latency.clone()));
        Self::new(config, provider, Arc::new(MockReportStore::new()), tools)
    }

    /// Get the session, creating it on first use.
    pub async fn session(&self, id: &str, patient_id: Option<&str>) -> Arc<Session> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                let patient_id = patient_id
                    .map(str::to_string)
                    .unwrap_or_else(|| self.config.proactive.default_patient_id.clone());
                tracing::info!(session = id, patient_id = %patient_id, "Session opened");
                Arc::new(Session {
                    transcript: Mutex::new(Transcript::new()),
                    agent: ProactiveAgent::new(self.store.clone(), patient_id),
                })
            })
            .clone()
    }

    pub async fn find_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(id).cloned()
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/assemblyai-token", get(token_handler))
        .route("/api/speaker", post(speaker_handler))
        .route("/api/context", post(context_handler))
        .route("/api/reports/rank", post(rank_handler))
        .route("/api/recommendations", post(recommendations_handler))
        .route("/api/workflow", post(workflow_handler))
        .route("/api/sessions/:id", get(session_handler))
        .route("/api/sessions/:id/utterances", post(utterance_handler))
        .route("/api/sessions/:id/intent", post(intent_handler))
        .route("/api/sessions/:id/suggestion", post(suggestion_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: ScribeConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState::from_config(config));

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Scribe HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SpeakerRequest {
    pub text: Option<String>,
    pub previous_speaker: Option<Speaker>,
}

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub utterances: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsRequest {
    #[serde(default)]
    pub transcript: String,
    pub patient_info: Option<PatientInfo>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    #[serde(flatten)]
    pub plan: PlanRequest,
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: Option<String>,
    /// Known speaker (e.g. from diarization); classified when absent.
    pub speaker: Option<Speaker>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub speech: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionAction {
    Display,
    Dismiss,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub action: SuggestionAction,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn bad_request(msg: &str) -> (StatusCode, serde_json::Value) {
    (StatusCode::BAD_REQUEST, json!(ErrorResponse::new(msg)))
}

fn session_not_found(id: &str) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::NOT_FOUND,
        json!(ErrorResponse::new(format!("Unknown session: {}", id))),
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check (pure, no IO).
pub fn health_inner() -> serde_json::Value {
    json!({ "ok": true })
}

/// Inner token relay: exchanges the server-held API key for a short-lived
/// streaming token so the key never reaches the browser.
pub async fn token_inner(
    client: &reqwest::Client,
    token_url: &str,
    api_key: Option<String>,
) -> (StatusCode, serde_json::Value) {
    let Some(api_key) = api_key else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Missing ASSEMBLYAI_API_KEY env var on server" }),
        );
    };

    let resp = match client
        .post(token_url)
        .header("authorization", api_key)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Token relay transport error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to fetch token", "details": e.to_string() }),
            );
        }
    };

    let upstream = resp.status();
    if !upstream.is_success() {
        let details = resp.text().await.unwrap_or_default();
        tracing::warn!(status = upstream.as_u16(), "Token request rejected upstream");
        let status =
            StatusCode::from_u16(upstream.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            status,
            json!({ "error": "AssemblyAI token request failed", "details": details }),
        );
    }

    match resp.json::<serde_json::Value>().await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Failed to fetch token", "details": e.to_string() }),
        ),
    }
}

/// Inner speaker classification (pure).
pub fn speaker_inner(req: SpeakerRequest) -> (StatusCode, serde_json::Value) {
    let Some(text) = req.text else {
        return bad_request("text is required");
    };

    let scores = score_utterance(&text, req.previous_speaker);
    let speaker = classify_speaker(&text, req.previous_speaker);
    (
        StatusCode::OK,
        json!({
            "speaker": speaker,
            "scores": { "doctor": scores.doctor, "patient": scores.patient },
        }),
    )
}

/// Inner context frame over the given utterances (pure).
pub fn context_inner(req: ContextRequest) -> serde_json::Value {
    json!(build_context_frame(&req.utterances, Utc::now()))
}

/// Inner ranking: fetch the catalogue and rank it against the tags.
pub async fn rank_inner(
    store: &dyn ReportStore,
    default_patient_id: &str,
    req: RankRequest,
) -> (StatusCode, serde_json::Value) {
    let patient_id = non_blank(req.patient_id).unwrap_or_else(|| default_patient_id.to_string());

    match store.fetch_catalogue(&patient_id, &req.tags).await {
        Ok(catalogue) => {
            let reports = rank_reports(&catalogue, &req.tags);
            (
                StatusCode::OK,
                json!({ "count": reports.len(), "reports": reports }),
            )
        }
        Err(e) => {
            tracing::error!(store = store.name(), "Catalogue fetch failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                json!(ErrorResponse::new(e.to_string())),
            )
        }
    }
}

/// Inner recommendations. A blank transcript short-circuits to an empty set.
pub async fn recommendations_inner(
    state: &HttpState,
    req: RecommendationsRequest,
) -> (StatusCode, serde_json::Value) {
    if req.transcript.trim().is_empty() {
        return (
            StatusCode::OK,
            json!(scribe_core::models::Recommendations::default()),
        );
    }

    let options = recommend_generation_options(state.config.generative.recommend_temperature);
    let recs = fetch_recommendations(
        state.provider.as_deref(),
        &req.transcript,
        req.patient_info.as_ref(),
        &options,
    )
    .await;
    (StatusCode::OK, json!(recs))
}

/// Inner workflow: plan, then execute every task in order.
pub async fn workflow_inner(state: &HttpState, req: WorkflowRequest) -> (StatusCode, serde_json::Value) {
    let patient_id = non_blank(req.patient_id)
        .unwrap_or_else(|| state.config.proactive.default_patient_id.clone());

    let options = plan_generation_options(state.config.generative.plan_temperature);
    let plan = plan_workflow(
        state.provider.as_deref(),
        &req.plan,
        &state.config.workflow,
        &options,
        Local::now().date_naive(),
    )
    .await;

    let mut progress: Vec<WorkflowExecutionState> = Vec::new();
    let final_state = execute_workflow(
        &plan,
        &patient_id,
        state.tools.as_ref(),
        &state.config.workflow,
        |s| {
            tracing::debug!(
                run_id = %s.run_id,
                task = s.current_task_index,
                completed = s.completed_count,
                failed = s.failed_count,
                "Workflow progress"
            );
            progress.push(s.clone());
        },
    )
    .await;

    (
        StatusCode::OK,
        json!({
            "plan": plan,
            "state": final_state,
            "progress_events": progress.len(),
            "progress": progress,
        }),
    )
}

/// Inner utterance append: label the line, then feed the whole transcript
/// to the session's proactive agent. The transcript lock is held until the
/// agent has taken the update, so frames land in transcript order. The
/// report pre-fetch (if any) keeps running after the response is sent.
pub async fn utterance_inner(
    state: &HttpState,
    session_id: &str,
    req: UtteranceRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(text) = req.text else {
        return bad_request("text is required");
    };

    let session = state.session(session_id, req.patient_id.as_deref()).await;

    let mut transcript = session.transcript.lock().await;
    let utterance = match req.speaker {
        Some(speaker) => transcript
            .push(Utterance {
                text,
                speaker,
                timestamp: Utc::now(),
            })
            .clone(),
        None => transcript.push_text(&text, Utc::now()).clone(),
    };

    let prefetch_started = session
        .agent
        .on_transcript_update(transcript.utterances())
        .await
        .is_some();
    let agent = session.agent.snapshot().await;
    drop(transcript);

    let frame = agent.context_frames.last().cloned();

    (
        StatusCode::OK,
        json!({
            "utterance": utterance,
            "frame": frame,
            "prefetch_started": prefetch_started,
            "agent": agent,
        }),
    )
}

/// Inner doctor-intent resolution for an existing session.
pub async fn intent_inner(
    state: &HttpState,
    session_id: &str,
    req: IntentRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(speech) = non_blank(req.speech) else {
        return bad_request("speech is required");
    };
    let Some(session) = state.find_session(session_id).await else {
        return session_not_found(session_id);
    };

    let intent = scribe_core::detect_report_intent(&speech);
    let report = session.agent.handle_doctor_intent(&speech).await;
    (StatusCode::OK, json!({ "intent": intent, "report": report }))
}

/// Inner suggestion display / dismiss for an existing session.
pub async fn suggestion_inner(
    state: &HttpState,
    session_id: &str,
    req: SuggestionRequest,
) -> (StatusCode, serde_json::Value) {
    let Some(session) = state.find_session(session_id).await else {
        return session_not_found(session_id);
    };

    let report = match req.action {
        SuggestionAction::Display => session.agent.display_suggestion().await,
        SuggestionAction::Dismiss => {
            session.agent.dismiss_suggestion().await;
            None
        }
    };
    let agent = session.agent.snapshot().await;
    (StatusCode::OK, json!({ "report": report, "phase": agent.phase }))
}

/// Inner session snapshot.
pub async fn session_inner(state: &HttpState, session_id: &str) -> (StatusCode, serde_json::Value) {
    let Some(session) = state.find_session(session_id).await else {
        return session_not_found(session_id);
    };

    let utterances = session.transcript.lock().await.len();
    let agent = session.agent.snapshot().await;
    (
        StatusCode::OK,
        json!({
            "session_id": session_id,
            "patient_id": session.agent.patient_id(),
            "utterances": utterances,
            "agent": agent,
        }),
    )
}

// ============================================================================
// Axum handlers (thin wrappers over inner functions)
// ============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(health_inner())
}

pub async fn token_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = token_inner(
        &state.client,
        &state.config.relay.token_url,
        state.config.relay.api_key(),
    )
    .await;
    (status, Json(body))
}

pub async fn speaker_handler(Json(req): Json<SpeakerRequest>) -> impl IntoResponse {
    let (status, body) = speaker_inner(req);
    (status, Json(body))
}

pub async fn context_handler(Json(req): Json<ContextRequest>) -> impl IntoResponse {
    Json(context_inner(req))
}

pub async fn rank_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<RankRequest>,
) -> impl IntoResponse {
    let (status, body) = rank_inner(
        state.store.as_ref(),
        &state.config.proactive.default_patient_id,
        req,
    )
    .await;
    (status, Json(body))
}

pub async fn recommendations_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<RecommendationsRequest>,
) -> impl IntoResponse {
    let (status, body) = recommendations_inner(&state, req).await;
    (status, Json(body))
}

pub async fn workflow_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<WorkflowRequest>,
) -> impl IntoResponse {
    let (status, body) = workflow_inner(&state, req).await;
    (status, Json(body))
}

pub async fn utterance_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(req): Json<UtteranceRequest>,
) -> impl IntoResponse {
    let (status, body) = utterance_inner(&state, &id, req).await;
    (status, Json(body))
}

pub async fn intent_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(req): Json<IntentRequest>,
) -> impl IntoResponse {
    let (status, body) = intent_inner(&state, &id, req).await;
    (status, Json(body))
}

pub async fn suggestion_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(req): Json<SuggestionRequest>,
) -> impl IntoResponse {
    let (status, body) = suggestion_inner(&state, &id, req).await;
    (status, Json(body))
}

pub async fn session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = session_inner(&state, &id).await;
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::config::ToolLatencyConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_state() -> HttpState {
        HttpState::new(
            ScribeConfig::default(),
            None,
            Arc::new(MockReportStore::new()),
            Arc::new(MockClinicalTools::new(ToolLatencyConfig::zero())),
        )
    }

    // ========================================================================
    // Health / speaker / context
    // ========================================================================

    #[test]
    fn test_health_inner_pure() {
        assert_eq!(health_inner(), json!({ "ok": true }));
    }

    #[test]
    fn test_speaker_inner_classifies() {
        let (status, body) = speaker_inner(SpeakerRequest {
            text: Some("I feel dizzy and my head hurts".to_string()),
            previous_speaker: Some(Speaker::Doctor),
        });
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speaker"], "patient");
        assert!(body["scores"]["patient"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_speaker_inner_requires_text() {
        let (status, body) = speaker_inner(SpeakerRequest {
            text: None,
            previous_speaker: None,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn test_speaker_inner_empty_text_uses_alternation() {
        let (status, body) = speaker_inner(SpeakerRequest {
            text: Some(String::new()),
            previous_speaker: Some(Speaker::Doctor),
        });
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speaker"], "patient");

        let (status, body) = speaker_inner(SpeakerRequest {
            text: Some("   ".to_string()),
            previous_speaker: None,
        });
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speaker"], "doctor");
    }

    #[test]
    fn test_context_inner_builds_frame() {
        let body = context_inner(ContextRequest {
            utterances: vec![Utterance {
                text: "I have a bad headache".to_string(),
                speaker: Speaker::Patient,
                timestamp: Utc::now(),
            }],
        });
        assert_eq!(body["dominant_context"], json!(["headache"]));
        assert_eq!(body["raw"], "I have a bad headache");
    }

    // ========================================================================
    // Token relay
    // ========================================================================

    #[tokio::test]
    async fn test_token_inner_missing_key() {
        let (status, body) =
            token_inner(&reqwest::Client::new(), "http://127.0.0.1:9/unused", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Missing ASSEMBLYAI_API_KEY env var on server");
    }

    #[tokio::test]
    async fn test_token_inner_passes_token_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/realtime/token"))
            .and(header("authorization", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123" })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v2/realtime/token", server.uri());
        let (status, body) =
            token_inner(&reqwest::Client::new(), &url, Some("test-key".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "token": "abc123" }));
    }

    #[tokio::test]
    async fn test_token_inner_mirrors_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/realtime/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let url = format!("{}/v2/realtime/token", server.uri());
        let (status, body) =
            token_inner(&reqwest::Client::new(), &url, Some("bad-key".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "AssemblyAI token request failed");
        assert_eq!(body["details"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_token_inner_transport_failure() {
        // Nothing listens on the discard port
        let (status, body) = token_inner(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/v2/realtime/token",
            Some("key".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch token");
        assert!(body["details"].is_string());
    }

    // ========================================================================
    // Ranking / recommendations / workflow
    // ========================================================================

    #[tokio::test]
    async fn test_rank_inner_headache() {
        let store = MockReportStore::new();
        let (status, body) = rank_inner(
            &store,
            "patient_001",
            RankRequest {
                tags: vec!["headache".to_string()],
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["reports"][0]["id"], "report_789");
        assert_eq!(body["reports"][0]["relevance_score"], 1);
    }

    #[tokio::test]
    async fn test_rank_inner_no_tags_is_empty() {
        let store = MockReportStore::new();
        let (_, body) = rank_inner(
            &store,
            "patient_001",
            RankRequest {
                tags: vec![],
                patient_id: Some("p2".to_string()),
            },
        )
        .await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_recommendations_inner_without_provider() {
        let state = make_state();
        let (status, body) = recommendations_inner(
            &state,
            RecommendationsRequest {
                transcript: "I have a fever".to_string(),
                patient_info: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "medications": [], "tests": [] }));
    }

    #[tokio::test]
    async fn test_workflow_inner_rule_based() {
        let state = make_state();
        let (status, body) = workflow_inner(
            &state,
            WorkflowRequest {
                plan: PlanRequest {
                    plan_text: "Paracetamol for fever".to_string(),
                    medications: vec!["Paracetamol".to_string()],
                    tests: vec![],
                    patient_info: None,
                },
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"]["tasks"].as_array().unwrap().len(), 3);
        assert_eq!(body["state"]["completed_count"], 3);
        assert_eq!(body["state"]["is_executing"], false);
        assert_eq!(body["state"]["patient_id"], "patient_001");
        assert_eq!(body["progress_events"], 6);

        let progress = body["progress"].as_array().unwrap();
        assert_eq!(progress.len(), 6);
        assert_eq!(progress[0]["tasks"][0]["status"], "executing");
        assert_eq!(progress[1]["tasks"][0]["status"], "completed");
        assert_eq!(progress[5]["completed_count"], 3);
    }

    #[tokio::test]
    async fn test_workflow_inner_uses_configured_pharmacy() {
        let mut config = ScribeConfig::default();
        config.workflow.default_pharmacy = "CityCare".to_string();
        let state = HttpState::new(
            config,
            None,
            Arc::new(MockReportStore::new()),
            Arc::new(MockClinicalTools::new(ToolLatencyConfig::zero())),
        );

        let (status, body) = workflow_inner(
            &state,
            WorkflowRequest {
                plan: PlanRequest {
                    medications: vec!["Ibuprofen".to_string()],
                    ..PlanRequest::default()
                },
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let pharmacy = &body["state"]["tasks"][1];
        assert_eq!(pharmacy["type"], "pharmacy_order");
        assert!(pharmacy["result"].as_str().unwrap().contains("sent to CityCare"));
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    #[tokio::test]
    async fn test_session_inner_unknown_is_404() {
        let state = make_state();
        let (status, _) = session_inner(&state, "nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = intent_inner(
            &state,
            "nope",
            IntentRequest {
                speech: Some("show me the reports".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_utterance_inner_labels_and_opens_session() {
        let state = make_state();
        let (status, body) = utterance_inner(
            &state,
            "s1",
            UtteranceRequest {
                text: Some("I have a bad headache".to_string()),
                speaker: None,
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["utterance"]["speaker"], "patient");
        assert_eq!(body["frame"]["dominant_context"], json!(["headache"]));
        assert_eq!(body["prefetch_started"], true);

        let (status, body) = session_inner(&state, "s1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["utterances"], 1);
        assert_eq!(body["patient_id"], "patient_001");
    }

    #[tokio::test]
    async fn test_utterance_inner_requires_text() {
        let state = make_state();
        let (status, _) = utterance_inner(
            &state,
            "s1",
            UtteranceRequest {
                text: None,
                speaker: None,
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.find_session("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_utterance_inner_accepts_empty_text() {
        let state = make_state();
        let (status, body) = utterance_inner(
            &state,
            "s1",
            UtteranceRequest {
                text: Some(String::new()),
                speaker: None,
                patient_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["utterance"]["speaker"], "doctor");
        assert_eq!(body["prefetch_started"], false);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_utterances_keep_frames_in_order() {
        let lines = [
            "I have a bad headache",
            "and my chest hurts when I breathe",
            "I also feel dizzy in the mornings",
            "the cough started last week",
            "my knee has been swollen",
            "I get short of breath on the stairs",
            "there is some back pain too",
            "and a rash on my arm",
        ];

        for round in 0..10 {
            let state = Arc::new(make_state());
            let session_id = format!("race-{}", round);
            let mut handles = Vec::new();
            for i in 0..16 {
                let state = state.clone();
                let session_id = session_id.clone();
                let text = lines[i % lines.len()].to_string();
                handles.push(tokio::spawn(async move {
                    utterance_inner(
                        &state,
                        &session_id,
                        UtteranceRequest {
                            text: Some(text),
                            speaker: Some(Speaker::Patient),
                            patient_id: None,
                        },
                    )
                    .await
                }));
            }
            for handle in handles {
                let (status, _) = handle.await.unwrap();
                assert_eq!(status, StatusCode::OK);
            }

            let session = state.find_session(&session_id).await.unwrap();
            let agent = session.agent.snapshot().await;
            assert_eq!(agent.context_frames.len(), 16);
            let lengths: Vec<usize> = agent.context_frames.iter().map(|f| f.raw.len()).collect();
            assert!(
                lengths.windows(2).all(|w| w[0] < w[1]),
                "frames out of transcript order: {:?}",
                lengths
            );
            let full = build_context_frame(session.transcript.lock().await.utterances(), Utc::now());
            assert_eq!(agent.current_dominant_tags, full.dominant_context);
        }
    }

    #[tokio::test]
    async fn test_suggestion_inner_dismiss() {
        let state = make_state();
        state.session("s1", None).await;
        let (status, body) = suggestion_inner(
            &state,
            "s1",
            SuggestionRequest {
                action: SuggestionAction::Dismiss,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["report"].is_null());
        assert_eq!(body["phase"], "idle");
    }
}
