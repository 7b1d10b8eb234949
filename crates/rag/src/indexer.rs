//! Document ingestion into the hybrid index

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use askdocs_core::{DenseEncoder, HybridIndex, IndexPoint, PointPayload, SparseEncoder};

use crate::RagError;

/// A document to index as one point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl IndexDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Encodes documents both ways and upserts them in batches
pub struct DocumentIndexer {
    dense: Arc<dyn DenseEncoder>,
    sparse: Arc<dyn SparseEncoder>,
    index: Arc<dyn HybridIndex>,
    batch_size: usize,
}

impl DocumentIndexer {
    pub fn new(
        dense: Arc<dyn DenseEncoder>,
        sparse: Arc<dyn SparseEncoder>,
        index: Arc<dyn HybridIndex>,
    ) -> Self {
        Self {
            dense,
            sparse,
            index,
            batch_size: 64,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index `documents`, returning the number of points written
    ///
    /// Blank documents are skipped.
    pub async fn index_documents(&self, documents: Vec<IndexDocument>) -> Result<usize, RagError> {
        let documents: Vec<IndexDocument> = documents
            .into_iter()
            .filter(|d| !d.content.trim().is_empty())
            .collect();

        let mut written = 0;

        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();

            let (dense, sparse) = tokio::join!(
                self.dense.embed_documents(&texts),
                self.sparse.encode(&texts)
            );
            let dense = dense?;
            let sparse = sparse?;

            if dense.len() != batch.len() || sparse.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "Encoders returned {} dense / {} sparse vectors for {} documents",
                    dense.len(),
                    sparse.len(),
                    batch.len()
                )));
            }

            let points: Vec<IndexPoint> = batch
                .iter()
                .zip(dense.into_iter().zip(sparse))
                .map(|(doc, (dense, sparse))| IndexPoint {
                    id: Uuid::new_v4().to_string(),
                    dense,
                    sparse,
                    payload: PointPayload {
                        content: doc.content.clone(),
                        source: doc.source.clone(),
                        metadata: doc.metadata.clone(),
                    },
                })
                .collect();

            written += self.index.upsert(points).await?;
        }

        tracing::info!(
            index = self.index.name(),
            documents = documents.len(),
            written,
            "Indexed documents"
        );

        Ok(written)
    }
}
