//! Question answering over indexed documents
//!
//! Features:
//! - LLM routing between retrieval and direct answers
//! - Query expansion with an explicit fallback contract
//! - Cited answer generation from reranked passages
//! - Enum-keyed pipeline state machine
//! - TTL answer cache

pub mod cache;
pub mod expander;
pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod router;

#[cfg(test)]
mod testing;

pub use cache::{AnswerCache, CacheSettings};
pub use expander::{ExpanderConfig, ExpansionError, QueryExpander, RewriteResult};
pub use generator::{format_context, AnswerGenerator, DirectGenerator};
pub use pipeline::{AnswerOutput, PipelineRun, PipelineStage, RagPipeline};
pub use router::{Datasource, RouteQuery, Router};

use askdocs_llm::LlmError;
use askdocs_rag::RagError;
use thiserror::Error;

/// Pipeline errors surfaced to callers
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// Every hybrid search failed; distinct from finding nothing
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<RagError> for AgentError {
    fn from(err: RagError) -> Self {
        match err {
            unavailable @ RagError::RetrievalUnavailable { .. } => {
                AgentError::RetrievalUnavailable(unavailable.to_string())
            },
            RagError::Timeout(msg) => AgentError::Timeout(msg),
            other => AgentError::Retrieval(other.to_string()),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => AgentError::Timeout("llm call".to_string()),
            other => AgentError::Generation(other.to_string()),
        }
    }
}

impl From<askdocs_core::Error> for AgentError {
    fn from(err: askdocs_core::Error) -> Self {
        use askdocs_core::Error;

        match err {
            Error::InvalidInput(msg) => AgentError::InvalidQuestion(msg),
            Error::RetrievalUnavailable(msg) => AgentError::RetrievalUnavailable(msg),
            Error::Llm(msg) => AgentError::Generation(msg),
            Error::Timeout(msg) => AgentError::Timeout(msg),
            other => AgentError::Retrieval(other.to_string()),
        }
    }
}

impl From<AgentError> for askdocs_core::Error {
    fn from(err: AgentError) -> Self {
        use askdocs_core::Error;

        match err {
            AgentError::InvalidQuestion(msg) => Error::InvalidInput(msg),
            AgentError::RetrievalUnavailable(msg) => Error::RetrievalUnavailable(msg),
            AgentError::Retrieval(msg) => Error::Index(msg),
            AgentError::Generation(msg) => Error::Llm(msg),
            AgentError::Timeout(msg) => Error::Timeout(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_retrieval_failure_kept_distinct() {
        let err: AgentError = RagError::RetrievalUnavailable {
            attempted: 3,
            last_error: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, AgentError::RetrievalUnavailable(_)));

        let err: AgentError = RagError::Reranker("bad gateway".to_string()).into();
        assert!(matches!(err, AgentError::Retrieval(_)));
    }

    #[test]
    fn test_llm_timeout_maps_to_timeout() {
        let err: AgentError = LlmError::Timeout.into();
        assert!(matches!(err, AgentError::Timeout(_)));
    }
}
