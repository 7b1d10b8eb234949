//! Single-query hybrid search

use std::sync::Arc;

use async_trait::async_trait;

use askdocs_core::{DenseEncoder, HybridIndex, Passage, SparseEncoder};

use crate::RagError;

/// One hybrid search over the index
#[async_trait]
pub trait HybridSearch: Send + Sync {
    /// Up to `limit` passages for `query`, in fused order
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, RagError>;
}

/// Encodes a query both ways and runs a fused index query
pub struct HybridSearcher {
    dense: Arc<dyn DenseEncoder>,
    sparse: Arc<dyn SparseEncoder>,
    index: Arc<dyn HybridIndex>,
}

impl HybridSearcher {
    pub fn new(
        dense: Arc<dyn DenseEncoder>,
        sparse: Arc<dyn SparseEncoder>,
        index: Arc<dyn HybridIndex>,
    ) -> Self {
        Self {
            dense,
            sparse,
            index,
        }
    }

    pub fn index(&self) -> &Arc<dyn HybridIndex> {
        &self.index
    }
}

#[async_trait]
impl HybridSearch for HybridSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, RagError> {
        // Dense embedding is a network call; sparse encoding is local
        let (dense, sparse) = tokio::join!(
            self.dense.embed_query(query),
            self.sparse.encode_query(query)
        );
        let dense = dense?;
        let sparse = sparse?;

        let passages = self.index.hybrid_query(&dense, &sparse, limit).await?;

        tracing::debug!(
            index = self.index.name(),
            query_len = query.len(),
            hits = passages.len(),
            "Hybrid search"
        );

        Ok(passages)
    }
}
