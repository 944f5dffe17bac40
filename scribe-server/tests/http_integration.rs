//! HTTP integration tests for the Scribe REST API
//!
//! Full handler dispatch through the axum router with `oneshot`. Collaborators
//! are the in-memory report store, zero-latency clinical tools and, where a
//! generative provider is needed, a wiremock Gemini endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use scribe_core::config::ToolLatencyConfig;
use scribe_core::{GeminiClient, GenerativeProvider, MockReportStore, ScribeConfig};
use scribe_server::http::{build_router, HttpState};
use scribe_server::subsystems::tools::MockClinicalTools;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_http_state(provider: Option<Arc<dyn GenerativeProvider>>) -> Arc<HttpState> {
    Arc::new(HttpState::new(
        ScribeConfig::default(),
        provider,
        Arc::new(MockReportStore::new()),
        Arc::new(MockClinicalTools::new(ToolLatencyConfig::zero())),
    ))
}

async fn send(state: Arc<HttpState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = build_router(state);

    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn gemini_text(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" }
        }]
    })
}

// ===========================================================================
// TEST 1: GET /api/health
// ===========================================================================
#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = send(make_http_state(None), "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

// ===========================================================================
// TEST 2: POST /api/speaker
// ===========================================================================
#[tokio::test]
async fn test_speaker_endpoint() {
    let (status, body) = send(
        make_http_state(None),
        "POST",
        "/api/speaker",
        Some(json!({ "text": "Let me examine you and check your blood pressure" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speaker"], "doctor");
}

// ===========================================================================
// TEST 3: POST /api/reports/rank
// ===========================================================================
#[tokio::test]
async fn test_rank_endpoint_chest_pain() {
    let (status, body) = send(
        make_http_state(None),
        "POST",
        "/api/reports/rank",
        Some(json!({ "tags": ["chest_pain"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["reports"][0]["id"], "report_722");
    assert_eq!(body["reports"][1]["id"], "report_600");
    assert_eq!(body["reports"][0]["type"], "xray");
}

// ===========================================================================
// TEST 4: proactive session over HTTP, headache then "see your reports"
// ===========================================================================
#[tokio::test]
async fn test_session_flow_surfaces_mri() {
    let state = make_http_state(None);

    let (status, body) = send(
        state.clone(),
        "POST",
        "/api/sessions/visit-1/utterances",
        Some(json!({ "text": "I have a bad headache", "speaker": "patient" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frame"]["dominant_context"], json!(["headache"]));

    let (status, body) = send(
        state.clone(),
        "POST",
        "/api/sessions/visit-1/intent",
        Some(json!({ "speech": "let's see your reports" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], true);
    assert_eq!(body["report"]["id"], "report_789");

    let (status, body) = send(state, "GET", "/api/sessions/visit-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"]["phase"], "displayed");
    assert_eq!(body["agent"]["surfaced_report"]["id"], "report_789");
}

// ===========================================================================
// TEST 5: unknown session is 404
// ===========================================================================
#[tokio::test]
async fn test_unknown_session_404() {
    let (status, body) = send(make_http_state(None), "GET", "/api/sessions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// TEST 6: POST /api/workflow without a provider runs the rule-based plan
// ===========================================================================
#[tokio::test]
async fn test_workflow_endpoint_rule_based() {
    let (status, body) = send(
        make_http_state(None),
        "POST",
        "/api/workflow",
        Some(json!({
            "plan_text": "Start Ibuprofen, order a CBC",
            "medications": ["Ibuprofen"],
            "tests": ["CBC"],
            "patient_id": "patient_042"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let kinds: Vec<&str> = body["plan"]["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["prescription", "pharmacy_order", "lab_order", "scheduling"]);
    assert_eq!(body["state"]["completed_count"], 4);
    assert_eq!(body["state"]["failed_count"], 0);
    assert_eq!(body["state"]["patient_id"], "patient_042");
}

// ===========================================================================
// TEST 7: POST /api/recommendations through a mocked Gemini endpoint
// ===========================================================================
#[tokio::test]
async fn test_recommendations_endpoint_with_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text(
            "```json\n{\"medications\": [{\"name\": \"Paracetamol\", \"dosage\": \"500mg\", \"frequency\": \"twice-daily\", \"reason\": \"fever\"}], \"tests\": [{\"name\": \"CBC\", \"reason\": \"infection screen\"}]}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::with_base_url("test-key", "gemini-2.0-flash", &server.uri(), None).unwrap();
    let state = make_http_state(Some(Arc::new(client)));

    let (status, body) = send(
        state,
        "POST",
        "/api/recommendations",
        Some(json!({
            "transcript": "I've had a fever and chills since yesterday",
            "patient_info": { "age": 34 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medications"][0]["name"], "Paracetamol");
    assert_eq!(body["tests"][0]["name"], "CBC");
}

// ===========================================================================
// TEST 8: Gemini failure on /api/workflow falls back to the rule-based plan
// ===========================================================================
#[tokio::test]
async fn test_workflow_endpoint_provider_error_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded" }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::with_base_url("test-key", "gemini-2.0-flash", &server.uri(), None).unwrap();
    let state = make_http_state(Some(Arc::new(client)));

    let (status, body) = send(
        state,
        "POST",
        "/api/workflow",
        Some(json!({ "plan_text": "Paracetamol", "medications": ["Paracetamol"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["plan"]["reasoning"],
        "Standard clinical workflow based on medications and tests"
    );
    assert_eq!(body["state"]["completed_count"], 3);
}
