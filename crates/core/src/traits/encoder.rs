//! Dense and sparse text encoders

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Dense embedding model
///
/// Implementations:
/// - `OpenAIEmbedder` - OpenAI-compatible `/embeddings`
/// - `OllamaEmbedder` - Ollama `/api/embed`
/// - `HashEmbedder` - deterministic offline embedder
#[async_trait]
pub trait DenseEncoder: Send + Sync {
    /// Embed passages for indexing, one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Fixed output dimensionality
    fn dimension(&self) -> usize;
}

/// Sparse (index, weight) vector
///
/// Indices are unique and ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        Self { indices, values }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Iterate `(index, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Lexical term-weight encoder
#[async_trait]
pub trait SparseEncoder: Send + Sync {
    /// Encode passages for indexing
    async fn encode(&self, texts: &[String]) -> Result<Vec<SparseVector>>;

    /// Encode a search query
    async fn encode_query(&self, text: &str) -> Result<SparseVector>;
}
