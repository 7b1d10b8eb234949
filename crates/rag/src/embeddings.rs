//! Dense embedding backends
//!
//! - `OpenAIEmbedder`: OpenAI-compatible `POST /embeddings`, batched
//! - `OllamaEmbedder`: Ollama `POST /api/embed`
//! - `HashEmbedder`: deterministic feature hashing, no model required
//!
//! ## Query instructions
//!
//! Instruction-tuned embedders (e.g. Qwen3-Embedding) retrieve better when
//! queries use `Instruct: <task>\nQuery:<query>`. Documents are always
//! embedded as plain text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use askdocs_config::constants::{endpoints, models, vectors};
use askdocs_core::DenseEncoder;

use crate::sparse::term_index;
use crate::RagError;

fn format_query(instruction: Option<&str>, query: &str) -> String {
    match instruction {
        Some(task) => format!("Instruct: {}\nQuery:{}", task, query),
        None => query.to_string(),
    }
}

fn check_dimension(expected: usize, vectors: &[Vec<f32>]) -> Result<(), RagError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(RagError::Embedding(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected,
            bad.len()
        ))),
        None => Ok(()),
    }
}

// =============================================================================
// OpenAI-compatible embeddings
// =============================================================================

/// OpenAI embedding configuration
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    /// Texts per request
    pub batch_size: usize,
    pub timeout: Duration,
    pub query_instruction: Option<String>,
}

impl Default for OpenAIEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OPENAI_DEFAULT.to_string(),
            api_key: None,
            model: models::EMBEDDING_MODEL.to_string(),
            dimension: vectors::DENSE_DIM,
            batch_size: 64,
            timeout: Duration::from_secs(30),
            query_instruction: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAIEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedder
pub struct OpenAIEmbedder {
    client: Client,
    config: OpenAIEmbeddingConfig,
}

impl OpenAIEmbedder {
    pub fn new(config: OpenAIEmbeddingConfig) -> Result<Self, RagError> {
        if config.batch_size == 0 {
            return Err(RagError::Config("embedding batch_size must be positive".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let request = OpenAIEmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Embedding request failed: {} - {}",
                status, text
            )));
        }

        let parsed: OpenAIEmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse embeddings: {}", e)))?;

        order_embeddings(parsed.data, texts.len())
    }
}

/// Restore input order from the `index` field
fn order_embeddings(
    mut data: Vec<OpenAIEmbedding>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    if data.len() != expected {
        return Err(RagError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl DenseEncoder for OpenAIEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> askdocs_core::Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.config.batch_size) {
            let batch = self.embed_batch(chunk).await?;
            check_dimension(self.config.dimension, &batch)?;
            all.extend(batch);
        }

        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> askdocs_core::Result<Vec<f32>> {
        let query = format_query(self.config.query_instruction.as_deref(), text);
        let mut batch = self.embed_batch(&[query]).await?;
        check_dimension(self.config.dimension, &batch)?;
        batch
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()).into())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

// =============================================================================
// Ollama embeddings
// =============================================================================

/// Ollama embedding configuration
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub query_instruction: Option<String>,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OLLAMA_DEFAULT.to_string(),
            model: "qwen3-embedding:0.6b".to_string(),
            dimension: 1024,
            timeout: Duration::from_secs(30),
            query_instruction: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama embedder
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaEmbeddingConfig,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn embed_raw(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let request = OllamaEmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let url = format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama embedding failed: {} - {}",
                status, text
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        check_dimension(self.config.dimension, &parsed.embeddings)?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl DenseEncoder for OllamaEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> askdocs_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.embed_raw(texts).await?)
    }

    async fn embed_query(&self, text: &str) -> askdocs_core::Result<Vec<f32>> {
        let query = format_query(self.config.query_instruction.as_deref(), text);
        let mut embeddings = self.embed_raw(&[query]).await?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()).into())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

// =============================================================================
// Hash embeddings
// =============================================================================

/// Feature-hashing embedder
///
/// Lowercased words are hashed into buckets with a hash-derived sign, then
/// the vector is L2-normalized. Texts sharing words get positive cosine
/// similarity, which is enough for tests and offline demos.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = term_index(&word.to_lowercase());
            let idx = hash as usize % self.dimension;
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl DenseEncoder for HashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> askdocs_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> askdocs_core::Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::new(384);
        let embedding = embedder.embed("Hello world");

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hash_embedder_similarity() {
        let embedder = HashEmbedder::new(256);
        let a = embedder.embed("qdrant hybrid search");
        let b = embedder.embed("Hybrid search with Qdrant");
        let c = embedder.embed("banana bread recipe");

        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[test]
    fn test_hash_embedder_empty_text() {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed("").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_format_query_instruction() {
        assert_eq!(format_query(None, "q"), "q");
        assert_eq!(
            format_query(Some("find docs"), "q"),
            "Instruct: find docs\nQuery:q"
        );
    }

    #[test]
    fn test_order_embeddings_by_index() {
        let data = vec![
            OpenAIEmbedding {
                index: 1,
                embedding: vec![1.0],
            },
            OpenAIEmbedding {
                index: 0,
                embedding: vec![0.0],
            },
        ];
        let ordered = order_embeddings(data, 2).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0]]);

        assert!(order_embeddings(Vec::new(), 1).is_err());
    }

    #[test]
    fn test_dimension_check() {
        assert!(check_dimension(2, &[vec![0.0, 1.0]]).is_ok());
        assert!(check_dimension(3, &[vec![0.0, 1.0]]).is_err());
    }

    #[test]
    fn test_openai_embedder_rejects_zero_batch() {
        let config = OpenAIEmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(OpenAIEmbedder::new(config).is_err());
    }

    #[tokio::test]
    async fn test_hash_embedder_trait() {
        let embedder = HashEmbedder::new(16);
        let docs = embedder
            .embed_documents(&["a b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(embedder.embed_query("a b").await.unwrap(), docs[0]);
    }
}
