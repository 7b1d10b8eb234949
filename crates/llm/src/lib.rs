//! LLM integration
//!
//! Features:
//! - OpenAI-compatible and Ollama chat backends with retry
//! - JSON-schema constrained (structured) output
//! - Plain string output

pub mod backend;
pub mod factory;
pub mod prompt;
pub mod structured;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig, ResponseSchema,
};
pub use factory::create_backend;
pub use prompt::{Message, Role};
pub use structured::{extract_json_object, invoke_structured, invoke_text, StructuredOutput};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for askdocs_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => askdocs_core::Error::Timeout("llm call".to_string()),
            other => askdocs_core::Error::Llm(other.to_string()),
        }
    }
}
