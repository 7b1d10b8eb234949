//! Shared error type

use thiserror::Error;

/// Errors crossing crate boundaries
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, Error>;
