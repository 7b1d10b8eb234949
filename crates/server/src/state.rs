//! Application State
//!
//! Shared state across all handlers. Every client is constructed and
//! connected here, before the listener binds.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use askdocs_agent::{
    AnswerCache, AnswerGenerator, CacheSettings, DirectGenerator, ExpanderConfig, QueryExpander,
    RagPipeline, Router,
};
use askdocs_config::Settings;
use askdocs_core::HybridIndex;
use askdocs_llm::{create_backend, LlmBackend};
use askdocs_rag::{
    build_dense_encoder, build_hybrid_index, build_reranker, build_sparse_encoder,
    DocumentIndexer, HybridSearcher, RetrievalOrchestrator, RetrieverConfig,
};

use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub pipeline: Arc<RagPipeline>,
    pub indexer: Arc<DocumentIndexer>,
    /// Index handle for readiness checks
    pub index: Arc<dyn HybridIndex>,
    /// Answer-generation backend, probed by readiness checks
    pub llm: Arc<dyn LlmBackend>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Settings,
        pipeline: RagPipeline,
        indexer: DocumentIndexer,
        index: Arc<dyn HybridIndex>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            indexer: Arc::new(indexer),
            index,
            llm,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build every component from settings
    ///
    /// Fails when a backend is misconfigured or the index is unreachable.
    pub async fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let dense = build_dense_encoder(&settings.embedding)?;
        let sparse = build_sparse_encoder(&settings.sparse);
        let index =
            build_hybrid_index(&settings.vector_store, settings.embedding.dimension).await?;
        let reranker = build_reranker(&settings.reranker)?;

        let llm = &settings.llm;
        let router_llm = create_backend(llm, &llm.router_model, llm.router_temperature)?;
        let generator_llm = create_backend(llm, &llm.generator_model, llm.generator_temperature)?;

        let searcher = Arc::new(HybridSearcher::new(
            dense.clone(),
            sparse.clone(),
            index.clone(),
        ));
        let retriever = RetrievalOrchestrator::new(
            searcher,
            reranker.clone(),
            RetrieverConfig::from(&settings.retriever),
        );

        let mut pipeline = RagPipeline::new(
            Router::new(router_llm.clone()),
            QueryExpander::new(router_llm, ExpanderConfig::from(&settings.expansion)),
            retriever,
            AnswerGenerator::new(generator_llm.clone()),
            DirectGenerator::new(generator_llm.clone()),
        )
        .with_max_question_chars(settings.server.max_question_chars);

        if settings.cache.enabled {
            pipeline = pipeline.with_cache(AnswerCache::new(CacheSettings::from(&settings.cache)));
        }

        let indexer = DocumentIndexer::new(dense, sparse, index.clone())
            .with_batch_size(settings.embedding.batch_size);

        tracing::info!(
            index = index.name(),
            reranker = reranker.name(),
            router_model = %settings.llm.router_model,
            generator_model = %settings.llm.generator_model,
            cache = settings.cache.enabled,
            "Pipeline assembled"
        );

        Ok(Self::new(settings, pipeline, indexer, index, generator_llm))
    }
}
