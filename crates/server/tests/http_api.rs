//! Router tests driven through `tower::ServiceExt::oneshot`

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use debate_agent_agent::{AnnotationPolicy, DebateAgent};
use debate_agent_config::Settings;
use debate_agent_llm::{GenerationResult, LlmBackend, LlmError, Message, ProviderChain};
use debate_agent_persistence::{InMemorySessionStore, SessionPolicy};
use debate_agent_server::{create_router, AppState};

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.llm.providers.clear();
    settings.server.max_message_length = 200;
    settings
}

fn app() -> Router {
    let settings = settings();
    let store = Arc::new(InMemorySessionStore::new(SessionPolicy::from(&settings.conversation)));
    let agent = DebateAgent::from_settings(&settings, store, ProviderChain::empty())
        .with_annotations(AnnotationPolicy::disabled());
    create_router(AppState::with_agent(settings, agent))
}

/// Backend that never answers within any sane timeout
struct Hanging(&'static str);

#[async_trait]
impl LlmBackend for Hanging {
    async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LlmError::Timeout)
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        self.0
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

fn bot_text(body: &Value, index: usize) -> String {
    body["messages"][index]["message"].as_str().unwrap_or_default().to_string()
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_two_turns() {
    let app = app();

    let (status, first) = post(
        &app,
        "/api/chat",
        json!({"session_id": null, "message": "explain why pepsi is better than coke"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert_eq!(first["messages"].as_array().unwrap().len(), 2);
    assert_eq!(first["messages"][0]["role"], "user");
    assert_eq!(first["messages"][1]["role"], "bot");
    assert!(first["messages"][1]["timestamp"].is_string());
    assert!(bot_text(&first, 1).contains("Coca-Cola"));
    assert!(first.get("ephemeral").is_none());

    let (status, second) = post(
        &app,
        "/api/chat",
        json!({"session_id": session_id, "message": "young people prefer pepsi"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(second["messages"].as_array().unwrap().len(), 4);
    assert!(bot_text(&second, 3).contains("Coca-Cola"));
}

#[tokio::test]
async fn test_chat_with_hanging_providers_returns_fallback() {
    let mut settings = settings();
    settings.server.request_timeout_seconds = 2;
    settings.llm.timeout_ms = 1000;
    settings.llm.budget_ms = 1500;

    let store = Arc::new(InMemorySessionStore::new(SessionPolicy::from(&settings.conversation)));
    let providers = ProviderChain::new(vec![
        Arc::new(Hanging("primary")) as Arc<dyn LlmBackend>,
        Arc::new(Hanging("secondary")),
    ]);
    let agent = DebateAgent::from_settings(&settings, store, providers)
        .with_annotations(AnnotationPolicy::disabled());
    let app = create_router(AppState::with_agent(settings, agent));

    let started = Instant::now();
    let (status, body) = post(&app, "/api/chat", json!({"message": "pepsi is better than coke"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert!(bot_text(&body, 1).contains("Coca-Cola"));
}

#[tokio::test]
async fn test_chat_accepts_conversation_id() {
    let app = app();
    let (_, first) = post(&app, "/api/chat", json!({"message": "pepsi vs coke"})).await;
    let id = first["session_id"].as_str().unwrap().to_string();

    let (status, second) = post(
        &app,
        "/api/chat",
        json!({"conversation_id": id, "message": "pepsi is sweeter"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["session_id"], id.as_str());
}

#[tokio::test]
async fn test_chat_unknown_session_starts_fresh() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/chat",
        json!({"session_id": "does-not-exist", "message": "vaccines are dangerous"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["session_id"], "does-not-exist");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_validation() {
    let app = app();

    let (status, body) = post(&app, "/api/chat", json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = post(&app, "/api/chat", json!({"session_id": null})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/api/chat", json!({"message": "x".repeat(201)})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/chat", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_delete_session() {
    let app = app();
    let (_, body) = post(&app, "/api/chat", json!({"message": "pepsi vs coke"})).await;
    let uri = format!("/api/chat/{}", body["session_id"].as_str().unwrap());

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn test_analyze() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/analyze",
        json!({"message": "Research shows that 95% of experts agree this is the best approach!"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let techniques = body["techniques"].as_array().unwrap();
    let names: Vec<&str> = techniques.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"authority"));
    assert!(names.contains(&"anchoring"));
    for technique in techniques {
        assert!(technique["category"].is_string());
        let confidence = technique["confidence"].as_f64().unwrap();
        assert!(confidence > 0.0 && confidence <= 1.0);
    }
}

#[tokio::test]
async fn test_analyze_requires_message() {
    let (status, _) = post(&app(), "/api/analyze", json!({"message": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_demonstrate() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/demonstrate",
        json!({"technique": "anchoring", "topic": "technology"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["technique"], "anchoring");
    assert!(!body["text"].as_str().unwrap().is_empty());
    assert!(body["explanation"].is_string());
    assert!(body["category"].is_string());
}

#[tokio::test]
async fn test_demonstrate_unknown_technique() {
    let (status, body) = post(
        &app(),
        "/api/demonstrate",
        json!({"technique": "nonexistent_technique", "topic": "technology"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown_technique");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("nonexistent_technique"));
}

#[tokio::test]
async fn test_demonstrate_requires_topic() {
    let (status, body) = post(
        &app(),
        "/api/demonstrate",
        json!({"technique": "anchoring", "topic": " "}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_list_techniques() {
    let (status, body) = get(&app(), "/api/techniques").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 18);

    let techniques = body["techniques"].as_array().unwrap();
    assert_eq!(techniques.len(), 18);
    for technique in techniques {
        assert!(technique["name"].is_string());
        assert!(technique["category"].is_string());
        assert!(!technique["description"].as_str().unwrap().is_empty());
    }
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get(&app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["status"], "connected");
    assert_eq!(body["providers"].as_array().unwrap().len(), 0);
    assert_eq!(body["config"]["conversation_ttl"], 3600);
    assert_eq!(body["config"]["max_pairs"], 5);
}

#[tokio::test]
async fn test_stats_counts_sessions() {
    let app = app();
    post(&app, "/api/chat", json!({"message": "pepsi vs coke"})).await;
    post(&app, "/api/chat", json!({"message": "tea vs coffee"})).await;

    let (status, body) = get(&app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_conversations"], 2);
    assert_eq!(body["store_status"], "connected");
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let (status, _) = get(&app(), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
