//! Hybrid vector store using Qdrant
//!
//! Each point carries a named dense vector and a named sparse vector. The
//! sparse vector config uses the IDF modifier, so BM25 term-frequency
//! weights from [`Bm25Encoder`](crate::Bm25Encoder) become full BM25 scores
//! at query time. Hybrid queries prefetch from both spaces and fuse them
//! server-side with RRF.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, Condition, CountPointsBuilder,
        CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, Fusion, Modifier,
        NamedVectors, PointStruct, PrefetchQueryBuilder, Query, QueryPointsBuilder, ScoredPoint,
        SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder, Value,
        Vector, VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
    },
    Qdrant,
};

use askdocs_config::constants::{endpoints, vectors};
use askdocs_config::VectorStoreConfig;
use askdocs_core::{HybridIndex, IndexPoint, Passage, SparseVector};

use crate::RagError;

/// Qdrant connection and collection layout
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant gRPC endpoint
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dense_vector_name: String,
    pub sparse_vector_name: String,
    /// Dense vector dimension
    pub dimension: usize,
    pub timeout: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: endpoints::QDRANT_DEFAULT.to_string(),
            api_key: None,
            collection: vectors::COLLECTION.to_string(),
            dense_vector_name: vectors::DENSE_NAME.to_string(),
            sparse_vector_name: vectors::SPARSE_NAME.to_string(),
            dimension: vectors::DENSE_DIM,
            timeout: Duration::from_secs(10),
        }
    }
}

impl QdrantConfig {
    pub fn from_settings(store: &VectorStoreConfig, dimension: usize) -> Self {
        Self {
            url: store.url.clone(),
            api_key: store.api_key.clone(),
            collection: store.collection.clone(),
            dense_vector_name: store.dense_vector_name.clone(),
            sparse_vector_name: store.sparse_vector_name.clone(),
            dimension,
            timeout: Duration::from_secs(store.timeout_secs),
        }
    }
}

/// Qdrant-backed hybrid index
pub struct QdrantHybridIndex {
    client: Qdrant,
    config: QdrantConfig,
}

impl QdrantHybridIndex {
    /// Build the client
    ///
    /// No request is made; call [`ensure_collection`](Self::ensure_collection)
    /// or [`HybridIndex::ready`] to verify connectivity.
    pub fn connect(config: QdrantConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.url).timeout(config.timeout);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create the collection with dense + sparse vector configs if absent
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;

        if exists {
            tracing::debug!(collection = %self.config.collection, "Collection exists");
            return Ok(());
        }

        let mut dense = VectorsConfigBuilder::default();
        dense.add_named_vector_params(
            &self.config.dense_vector_name,
            VectorParamsBuilder::new(self.config.dimension as u64, Distance::Cosine),
        );

        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(
            &self.config.sparse_vector_name,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.config.collection)
                    .vectors_config(dense)
                    .sparse_vectors_config(sparse),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        tracing::info!(
            collection = %self.config.collection,
            dimension = self.config.dimension,
            "Created hybrid collection"
        );

        Ok(())
    }

    fn source_filter(source: &str) -> Filter {
        Filter::must([Condition::matches(vectors::SOURCE_KEY, source.to_string())])
    }

    fn to_point_struct(&self, point: IndexPoint) -> PointStruct {
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert(vectors::CONTENT_KEY.to_string(), point.payload.content.into());

        if let Some(source) = point.payload.source {
            payload.insert(vectors::SOURCE_KEY.to_string(), source.into());
        }

        for (k, v) in point.payload.metadata {
            payload.entry(k).or_insert_with(|| v.into());
        }

        let vectors = NamedVectors::default()
            .add_vector(&self.config.dense_vector_name, Vector::new_dense(point.dense))
            .add_vector(
                &self.config.sparse_vector_name,
                Vector::new_sparse(point.sparse.indices, point.sparse.values),
            );

        PointStruct::new(point.id, vectors, payload)
    }
}

/// Extract the passage from a scored point's payload
fn passage_from_point(point: ScoredPoint) -> Option<Passage> {
    let mut content = None;
    let mut source = None;

    for (k, v) in point.payload {
        if let Some(Kind::StringValue(s)) = v.kind {
            if k == vectors::CONTENT_KEY {
                content = Some(s);
            } else if k == vectors::SOURCE_KEY {
                source = Some(s);
            }
        }
    }

    let point_id = point.id.and_then(|pid| match pid.point_id_options {
        Some(PointIdOptions::Uuid(u)) => Some(u),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    });

    content.map(|content| Passage {
        content,
        point_id,
        source,
    })
}

#[async_trait]
impl HybridIndex for QdrantHybridIndex {
    async fn upsert(&self, points: Vec<IndexPoint>) -> askdocs_core::Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let written = points.len();
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| self.to_point_struct(p))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points).wait(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(written)
    }

    async fn hybrid_query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
    ) -> askdocs_core::Result<Vec<Passage>> {
        let limit = limit as u64;

        let mut search = QueryPointsBuilder::new(&self.config.collection).add_prefetch(
            PrefetchQueryBuilder::default()
                .query(Query::new_nearest(dense.to_vec()))
                .using(&self.config.dense_vector_name)
                .limit(limit),
        );

        // Qdrant rejects empty sparse queries; dense-only fusion still ranks
        if !sparse.is_empty() {
            search = search.add_prefetch(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(VectorInput::new_sparse(
                        sparse.indices.clone(),
                        sparse.values.clone(),
                    )))
                    .using(&self.config.sparse_vector_name)
                    .limit(limit),
            );
        }

        let search = search.with_payload(true).query(Fusion::Rrf).limit(limit);

        let response = self
            .client
            .query(search)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let passages: Vec<Passage> = response
            .result
            .into_iter()
            .filter_map(passage_from_point)
            .collect();

        tracing::debug!(
            collection = %self.config.collection,
            hits = passages.len(),
            "Qdrant hybrid query"
        );

        Ok(passages)
    }

    async fn delete_by_source(&self, source: &str) -> askdocs_core::Result<u64> {
        let matching = self
            .client
            .count(
                CountPointsBuilder::new(&self.config.collection)
                    .filter(Self::source_filter(source))
                    .exact(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?
            .result
            .map(|r| r.count)
            .unwrap_or(0);

        if matching == 0 {
            return Ok(0);
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(Self::source_filter(source))
                    .wait(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        tracing::info!(source, deleted = matching, "Deleted points by source");
        Ok(matching)
    }

    async fn count(&self) -> askdocs_core::Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.config.collection).exact(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn ready(&self) -> bool {
        match self.client.collection_exists(&self.config.collection).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, "Qdrant readiness check failed");
                false
            },
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdocs_core::PointPayload;
    use qdrant_client::qdrant::PointId;

    fn string_value(s: &str) -> Value {
        Value::from(s.to_string())
    }

    #[test]
    fn test_config_from_settings() {
        let store = VectorStoreConfig::default();
        let config = QdrantConfig::from_settings(&store, 768);
        assert_eq!(config.collection, "rag_chunks");
        assert_eq!(config.dense_vector_name, "dense");
        assert_eq!(config.sparse_vector_name, "bm25");
        assert_eq!(config.dimension, 768);
    }

    #[test]
    fn test_passage_from_point() {
        let mut payload = HashMap::new();
        payload.insert("content".to_string(), string_value("hello"));
        payload.insert("source".to_string(), string_value("doc.md"));
        payload.insert("lang".to_string(), string_value("en"));

        let point = ScoredPoint {
            id: Some(PointId::from("7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string())),
            payload,
            score: 0.5,
            ..Default::default()
        };

        let passage = passage_from_point(point).unwrap();
        assert_eq!(passage.content, "hello");
        assert_eq!(passage.source.as_deref(), Some("doc.md"));
        assert_eq!(
            passage.point_id.as_deref(),
            Some("7c9e6679-7425-40de-944b-e07fc1f90ae7")
        );
    }

    #[test]
    fn test_point_without_content_is_skipped() {
        let point = ScoredPoint {
            payload: HashMap::new(),
            ..Default::default()
        };
        assert!(passage_from_point(point).is_none());
    }

    #[test]
    fn test_to_point_struct_payload() {
        let index = QdrantHybridIndex::connect(QdrantConfig::default()).unwrap();
        let mut metadata = HashMap::new();
        metadata.insert("page".to_string(), "3".to_string());
        // Metadata may not shadow reserved keys
        metadata.insert("content".to_string(), "spoofed".to_string());

        let point = index.to_point_struct(IndexPoint {
            id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string(),
            dense: vec![0.1, 0.2],
            sparse: SparseVector::new(vec![1, 5], vec![0.5, 0.7]),
            payload: PointPayload {
                content: "text".to_string(),
                source: Some("a.md".to_string()),
                metadata,
            },
        });

        let content = point.payload.get("content").and_then(|v| v.kind.clone());
        assert_eq!(content, Some(Kind::StringValue("text".to_string())));
        assert!(point.payload.contains_key("source"));
        assert!(point.payload.contains_key("page"));
        assert!(point.vectors.is_some());
    }
}
