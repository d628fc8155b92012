//! Debate Agent Server
//!
//! Provides the HTTP endpoints for the debate agent.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, record_analyze, record_demonstrate, record_store_error, record_turn};
pub use state::AppState;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use debate_agent_agent::{AgentError, PersuasionError};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown technique: {0}")]
    UnknownTechnique(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) | ServerError::UnknownTechnique(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::UnknownTechnique(_) => "unknown_technique",
            ServerError::NotFound(_) => "not_found",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Internal(message) = &self {
            tracing::error!(error = %message, "Request failed");
        }
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::InvalidInput(message) => ServerError::InvalidRequest(message),
            AgentError::Persuasion(PersuasionError::UnknownTechnique(name)) => {
                ServerError::UnknownTechnique(name)
            }
            AgentError::Store(e) => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StatusCode::from(ServerError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::UnknownTechnique("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServerError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_agent_error_mapping() {
        let err = ServerError::from(AgentError::Persuasion(PersuasionError::UnknownTechnique(
            "nonexistent_technique".into(),
        )));
        assert_eq!(err.code(), "unknown_technique");
        assert_eq!(err.to_string(), "Unknown technique: nonexistent_technique");

        let err = ServerError::from(AgentError::InvalidInput("empty".into()));
        assert_eq!(err.code(), "invalid_request");
    }
}
