//! askdocs server
//!
//! HTTP endpoints for question answering and document ingestion.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use askdocs_agent::AgentError;
use askdocs_llm::LlmError;
use askdocs_rag::RagError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Startup(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Label for the `status` dimension of request counters
    pub fn label(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid",
            ServerError::Unavailable(_) => "unavailable",
            ServerError::Startup(_) | ServerError::Internal(_) => "error",
        }
    }

    /// Message returned to the client. Backend detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::InvalidRequest(_) => self.to_string(),
            ServerError::Unavailable(_) => "Retrieval service unavailable".to_string(),
            ServerError::Startup(_) | ServerError::Internal(_) => {
                "Internal server error".to_string()
            },
        }
    }
}

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::InvalidQuestion(msg) => ServerError::InvalidRequest(msg),
            AgentError::RetrievalUnavailable(msg) => ServerError::Unavailable(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<askdocs_core::Error> for ServerError {
    fn from(err: askdocs_core::Error) -> Self {
        match err {
            askdocs_core::Error::InvalidInput(msg) => ServerError::InvalidRequest(msg),
            askdocs_core::Error::Index(msg) | askdocs_core::Error::RetrievalUnavailable(msg) => {
                ServerError::Unavailable(msg)
            },
            askdocs_core::Error::Config(msg) => ServerError::Startup(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<RagError> for ServerError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Config(msg) => ServerError::Startup(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<LlmError> for ServerError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => ServerError::Startup(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::Internal(detail) | ServerError::Startup(detail) => {
                tracing::error!(error = %detail, "Request failed");
            },
            ServerError::Unavailable(detail) => {
                tracing::warn!(error = %detail, "Retrieval unavailable");
            },
            ServerError::InvalidRequest(_) => {},
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
