//! HTTP Endpoints
//!
//! REST API for the debate agent.

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use debate_agent_agent::{Demonstration, TechniqueSummary};
use debate_agent_core::{DetectedTechnique, Message};

use crate::metrics::{record_analyze, record_demonstrate, record_store_error, record_turn};
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);
    let timeout = Duration::from_secs(state.config.server.request_timeout_seconds);

    Router::new()
        // Debate
        .route("/api/chat", post(chat))
        .route("/api/chat/:session_id", delete(delete_session))
        // Persuasion analysis
        .route("/api/analyze", post(analyze))
        .route("/api/demonstrate", post(demonstrate))
        .route("/api/techniques", get(list_techniques))
        // Operations
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns a permissive layer
/// - If cors_origins is empty or all invalid, allows localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Trimmed, non-empty text within `max_chars`
fn require_text<'a>(field: &str, value: &'a str, max_chars: Option<usize>) -> Result<&'a str, ServerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServerError::InvalidRequest(format!("{} must not be empty", field)));
    }
    if let Some(max) = max_chars {
        if trimmed.chars().count() > max {
            return Err(ServerError::InvalidRequest(format!(
                "{} must be at most {} characters",
                field, max
            )));
        }
    }
    Ok(trimmed)
}

// =============================================================================
// Debate
// =============================================================================

/// Chat request
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default, alias = "conversation_id")]
    session_id: Option<String>,
    message: String,
}

/// Chat response
#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    ephemeral: bool,
}

/// One debate turn
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let Json(request) = payload?;
    let message = require_text("message", &request.message, Some(state.config.server.max_message_length))?;
    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let outcome = state.agent.handle_turn(session_id, message).await?;
    record_turn(&outcome);

    Ok(Json(ChatResponse {
        session_id: outcome.session_id,
        messages: outcome.messages,
        ephemeral: outcome.ephemeral,
    }))
}

/// Delete a session
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    match state.agent.delete_session(&session_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(ServerError::NotFound(format!("session {}", session_id))),
        Err(e) => {
            record_store_error();
            Err(ServerError::Internal(e.to_string()))
        }
    }
}

// =============================================================================
// Persuasion analysis
// =============================================================================

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    techniques: Vec<DetectedTechnique>,
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ServerError> {
    let Json(request) = payload?;
    let message = require_text("message", &request.message, Some(state.config.server.max_message_length))?;

    record_analyze();
    Ok(Json(AnalyzeResponse {
        techniques: state.agent.analyze(message),
    }))
}

#[derive(Debug, Deserialize)]
struct DemonstrateRequest {
    technique: String,
    topic: String,
}

async fn demonstrate(
    State(state): State<AppState>,
    payload: Result<Json<DemonstrateRequest>, JsonRejection>,
) -> Result<Json<Demonstration>, ServerError> {
    let result = payload.map_err(ServerError::from).and_then(|Json(request)| {
        let technique = require_text("technique", &request.technique, None)?;
        let topic = require_text("topic", &request.topic, None)?;
        Ok(state.agent.demonstrate(technique, topic)?)
    });

    record_demonstrate(match &result {
        Ok(_) => "ok",
        Err(ServerError::UnknownTechnique(_)) => "unknown_technique",
        Err(_) => "invalid",
    });
    result.map(Json)
}

#[derive(Debug, Serialize)]
struct TechniquesResponse {
    techniques: Vec<TechniqueSummary>,
    count: usize,
}

async fn list_techniques(State(state): State<AppState>) -> Json<TechniquesResponse> {
    let techniques = state.agent.techniques();
    Json(TechniquesResponse {
        count: techniques.len(),
        techniques,
    })
}

// =============================================================================
// Operations
// =============================================================================

/// Health check
///
/// The service answers turns without a store or providers, so it reports
/// `degraded` rather than failing.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.agent.store_health().await;
    let providers: Vec<serde_json::Value> = state
        .agent
        .providers()
        .status()
        .await
        .into_iter()
        .map(|p| {
            serde_json::json!({
                "model": p.model,
                "status": if p.available { "available" } else { "unavailable" },
            })
        })
        .collect();

    let status = if store.reachable { "healthy" } else { "degraded" };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "store": {
            "backend": store.backend,
            "status": if store.reachable { "connected" } else { "unavailable" },
        },
        "providers": providers,
        "config": {
            "conversation_ttl": state.config.conversation.ttl_seconds,
            "max_pairs": state.config.conversation.max_pairs,
        },
    }))
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (total, store_status) = match state.agent.session_count().await {
        Ok(count) => (Some(count), "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Session count unavailable");
            record_store_error();
            (None, "unavailable")
        }
    };

    Json(serde_json::json!({
        "total_conversations": total,
        "store_status": store_status,
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("metrics are disabled".to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("message", "  hi  ", Some(10)).unwrap(), "hi");
        assert!(require_text("message", "   ", Some(10)).is_err());
        assert!(require_text("message", "abcdefghijk", Some(10)).is_err());
        assert!(require_text("topic", "anything at all", None).is_ok());
    }

    #[test]
    fn test_chat_request_accepts_conversation_id() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"conversation_id": "abc", "message": "hi"}"#).unwrap();
        assert_eq!(request.session_id.as_deref(), Some("abc"));

        let request: ChatRequest = serde_json::from_str(r#"{"session_id": null, "message": "hi"}"#).unwrap();
        assert_eq!(request.session_id, None);
    }

    #[test]
    fn test_cors_layers_build() {
        let _ = build_cors_layer(&[], false);
        let _ = build_cors_layer(&["not a header\n".to_string()], true);
        let _ = build_cors_layer(&["http://example.com".to_string()], true);
    }
}
