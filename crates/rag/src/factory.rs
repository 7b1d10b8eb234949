//! Build retrieval components from settings

use std::sync::Arc;
use std::time::Duration;

use askdocs_config::{
    EmbeddingConfig, EmbeddingProvider, RerankerProvider, RerankerSettings, SparseSettings,
    VectorBackend, VectorStoreConfig,
};
use askdocs_core::{DenseEncoder, HybridIndex, Reranker, SparseEncoder};

use crate::embeddings::{
    HashEmbedder, OllamaEmbedder, OllamaEmbeddingConfig, OpenAIEmbedder, OpenAIEmbeddingConfig,
};
use crate::memory_index::InMemoryHybridIndex;
use crate::reranker::{HttpReranker, HttpRerankerConfig, LexicalReranker};
use crate::sparse::{Bm25Config, Bm25Encoder};
use crate::vector_store::{QdrantConfig, QdrantHybridIndex};
use crate::RagError;

pub fn build_dense_encoder(config: &EmbeddingConfig) -> Result<Arc<dyn DenseEncoder>, RagError> {
    let timeout = Duration::from_secs(config.timeout_secs);

    let encoder: Arc<dyn DenseEncoder> = match config.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::new(OpenAIEmbeddingConfig {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size,
            timeout,
            query_instruction: config.query_instruction.clone(),
        })?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(OllamaEmbeddingConfig {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout,
            query_instruction: config.query_instruction.clone(),
        })?),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(config.dimension)),
    };

    tracing::info!(
        provider = ?config.provider,
        model = %config.model,
        dimension = config.dimension,
        "Dense encoder ready"
    );

    Ok(encoder)
}

pub fn build_sparse_encoder(settings: &SparseSettings) -> Arc<dyn SparseEncoder> {
    Arc::new(Bm25Encoder::new(Bm25Config::from(settings)))
}

/// Connect the configured index and make sure it can take queries
///
/// For Qdrant this creates the collection when missing, so an unreachable
/// server fails here rather than on the first question.
pub async fn build_hybrid_index(
    config: &VectorStoreConfig,
    dimension: usize,
) -> Result<Arc<dyn HybridIndex>, RagError> {
    match config.backend {
        VectorBackend::Qdrant => {
            let index = QdrantHybridIndex::connect(QdrantConfig::from_settings(config, dimension))?;
            index.ensure_collection().await?;
            tracing::info!(url = %config.url, collection = %config.collection, "Qdrant index ready");
            Ok(Arc::new(index))
        },
        VectorBackend::Memory => {
            tracing::warn!("Using in-memory index; documents are lost on restart");
            Ok(Arc::new(
                InMemoryHybridIndex::new(dimension).with_rrf_k(config.rrf_k),
            ))
        },
    }
}

pub fn build_reranker(settings: &RerankerSettings) -> Result<Arc<dyn Reranker>, RagError> {
    match settings.provider {
        RerankerProvider::Infinity => Ok(Arc::new(HttpReranker::new(HttpRerankerConfig::from(
            settings,
        ))?)),
        RerankerProvider::Lexical => Ok(Arc::new(LexicalReranker::new())),
        RerankerProvider::Onnx => build_onnx_reranker(settings),
    }
}

#[cfg(feature = "onnx")]
fn build_onnx_reranker(settings: &RerankerSettings) -> Result<Arc<dyn Reranker>, RagError> {
    let (Some(model), Some(tokenizer)) = (&settings.model_path, &settings.tokenizer_path) else {
        return Err(RagError::Config(
            "onnx reranker requires model_path and tokenizer_path".to_string(),
        ));
    };

    Ok(Arc::new(crate::reranker::CrossEncoderReranker::new(
        model,
        tokenizer,
        settings.max_seq_len,
    )?))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx_reranker(_settings: &RerankerSettings) -> Result<Arc<dyn Reranker>, RagError> {
    Err(RagError::Config(
        "onnx reranker requested but askdocs-rag was built without the `onnx` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_index() {
        let config = VectorStoreConfig {
            backend: VectorBackend::Memory,
            ..Default::default()
        };
        let index = build_hybrid_index(&config, 8).await.unwrap();
        assert_eq!(index.name(), "memory");
        assert!(index.ready().await);
    }

    #[test]
    fn test_hash_encoder() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hash,
            dimension: 16,
            ..Default::default()
        };
        assert_eq!(build_dense_encoder(&config).unwrap().dimension(), 16);
    }

    #[test]
    fn test_rerankers() {
        let lexical = RerankerSettings {
            provider: RerankerProvider::Lexical,
            ..Default::default()
        };
        assert_eq!(build_reranker(&lexical).unwrap().name(), "lexical");
        assert_eq!(
            build_reranker(&RerankerSettings::default()).unwrap().name(),
            "infinity"
        );
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_requires_feature() {
        let settings = RerankerSettings {
            provider: RerankerProvider::Onnx,
            ..Default::default()
        };
        assert!(matches!(build_reranker(&settings), Err(RagError::Config(_))));
    }
}
