//! Hybrid retrieval for askdocs
//!
//! Features:
//! - BM25 sparse encoding via a tantivy analyzer
//! - Dense embeddings (OpenAI-compatible, Ollama, offline hash)
//! - Hybrid dense + sparse indexes (Qdrant, in-memory) with RRF fusion
//! - Cross-encoder reranking (Infinity HTTP, ONNX, lexical fallback)
//! - Multi-query retrieval orchestration with dedup and partial-failure tolerance
//! - Document indexing

pub mod embeddings;
pub mod factory;
pub mod fusion;
pub mod indexer;
pub mod memory_index;
pub mod reranker;
pub mod retriever;
pub mod search;
pub mod sparse;
mod stopwords;
pub mod vector_store;

pub use embeddings::{
    HashEmbedder, OllamaEmbedder, OllamaEmbeddingConfig, OpenAIEmbedder, OpenAIEmbeddingConfig,
};
pub use factory::{build_dense_encoder, build_hybrid_index, build_reranker, build_sparse_encoder};
pub use fusion::reciprocal_rank_fusion;
pub use indexer::{DocumentIndexer, IndexDocument};
pub use memory_index::InMemoryHybridIndex;
#[cfg(feature = "onnx")]
pub use reranker::CrossEncoderReranker;
pub use reranker::{HttpReranker, HttpRerankerConfig, LexicalReranker};
pub use retriever::{dedup_by_content, RetrievalOrchestrator, RetrieverConfig};
pub use search::{HybridSearch, HybridSearcher};
pub use sparse::{Bm25Config, Bm25Encoder};
pub use vector_store::{QdrantConfig, QdrantHybridIndex};

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Every hybrid search of a retrieval failed
    #[error("Retrieval unavailable: all {attempted} searches failed (last error: {last_error})")]
    RetrievalUnavailable { attempted: usize, last_error: String },
}

impl From<RagError> for askdocs_core::Error {
    fn from(err: RagError) -> Self {
        use askdocs_core::Error;

        match err {
            RagError::Embedding(msg) => Error::Encoder(msg),
            RagError::VectorStore(msg) | RagError::Search(msg) | RagError::Connection(msg) => {
                Error::Index(msg)
            },
            RagError::Reranker(msg) | RagError::Model(msg) => Error::Reranker(msg),
            RagError::Config(msg) => Error::Config(msg),
            RagError::Timeout(msg) => Error::Timeout(msg),
            unavailable @ RagError::RetrievalUnavailable { .. } => {
                Error::RetrievalUnavailable(unavailable.to_string())
            },
        }
    }
}

impl From<askdocs_core::Error> for RagError {
    fn from(err: askdocs_core::Error) -> Self {
        use askdocs_core::Error;

        match err {
            Error::Encoder(msg) => RagError::Embedding(msg),
            Error::Index(msg) => RagError::VectorStore(msg),
            Error::Reranker(msg) => RagError::Reranker(msg),
            Error::Timeout(msg) => RagError::Timeout(msg),
            Error::Config(msg) => RagError::Config(msg),
            other => RagError::Search(other.to_string()),
        }
    }
}

/// Bound an external call; elapsing counts as a failure of that call
pub(crate) async fn with_timeout<T, F>(what: &str, limit: Duration, fut: F) -> Result<T, RagError>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout(format!("{} exceeded {:?}", what, limit))),
    }
}
