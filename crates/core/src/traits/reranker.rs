//! Cross-encoder reranking

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One reranked document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    /// Position of the document in the input slice
    pub index: usize,
    pub document: String,
    pub score: f32,
}

/// Scores (query, document) pairs jointly
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `documents` against `query`
    ///
    /// Returns at most `top_k` hits sorted by descending score, ties kept in
    /// input order. Empty input yields an empty result without any scoring.
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize)
        -> Result<Vec<RerankHit>>;

    /// Reranker name for logging
    fn name(&self) -> &str;
}
