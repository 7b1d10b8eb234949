//! Centralized defaults
//!
//! Single source of truth for endpoints and tuning values shared by the
//! settings defaults and the component configs in other crates.

/// Service endpoints
pub mod endpoints {
    /// OpenAI-compatible API base
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Local Ollama server
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Qdrant gRPC endpoint
    pub const QDRANT_DEFAULT: &str = "http://localhost:6334";

    /// Infinity-compatible rerank service
    pub const RERANKER_DEFAULT: &str = "http://localhost:8002";
}

/// Model identifiers
pub mod models {
    pub const ROUTER_MODEL: &str = "gpt-4o-mini";
    pub const GENERATOR_MODEL: &str = "gpt-4o";
    pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
    pub const RERANKER_MODEL: &str = "BAAI/bge-reranker-v2-m3";
}

/// Retrieval tuning
pub mod retrieval {
    /// Candidates requested per hybrid search
    pub const INITIAL_LIMIT: usize = 30;

    /// Passages kept after reranking
    pub const FINAL_TOP_K: usize = 5;

    /// Reciprocal rank fusion damping constant
    pub const RRF_K: f32 = 60.0;

    /// Per-search timeout (ms)
    pub const SEARCH_TIMEOUT_MS: u64 = 10_000;

    /// Rerank call timeout (ms)
    pub const RERANK_TIMEOUT_MS: u64 = 60_000;
}

/// Vector store layout
pub mod vectors {
    pub const COLLECTION: &str = "rag_chunks";
    pub const DENSE_NAME: &str = "dense";
    pub const SPARSE_NAME: &str = "bm25";
    pub const DENSE_DIM: usize = 1536;

    /// Payload key holding passage text
    pub const CONTENT_KEY: &str = "content";

    /// Payload key holding the source document
    pub const SOURCE_KEY: &str = "source";
}

/// BM25 parameters
pub mod bm25 {
    pub const K1: f32 = 1.2;
    pub const B: f32 = 0.75;
    pub const AVG_DOC_LEN: f32 = 256.0;
}
