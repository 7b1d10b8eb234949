//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{bm25, endpoints, models, retrieval, vectors};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// All validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Chat model access for routing, expansion and generation
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub sparse: SparseSettings,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub reranker: RerankerSettings,

    #[serde(default)]
    pub retriever: RetrieverSettings,

    #[serde(default)]
    pub expansion: ExpansionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_true() -> bool {
    true
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means localhost only.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Longest accepted question, in characters
    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_question_chars() -> usize {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            max_question_chars: default_max_question_chars(),
        }
    }
}

/// Chat backend flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Ollama,
}

/// LLM settings
///
/// The router and query expander share `router_model`; answer generation
/// uses `generator_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_router_model")]
    pub router_model: String,

    #[serde(default)]
    pub router_temperature: f32,

    #[serde(default = "default_generator_model")]
    pub generator_model: String,

    #[serde(default)]
    pub generator_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_llm_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}
fn default_router_model() -> String {
    models::ROUTER_MODEL.to_string()
}
fn default_generator_model() -> String {
    models::GENERATOR_MODEL.to_string()
}
fn default_max_tokens() -> usize {
    1024
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_llm_endpoint(),
            api_key: default_llm_api_key(),
            router_model: default_router_model(),
            router_temperature: 0.0,
            generator_model: default_generator_model(),
            generator_temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Dense embedding backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    OpenAI,
    Ollama,
    /// Deterministic offline embedder
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dense_dim")]
    pub dimension: usize,

    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,

    /// Prefix added to queries (for instruction-tuned embedders)
    #[serde(default)]
    pub query_instruction: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    models::EMBEDDING_MODEL.to_string()
}
fn default_dense_dim() -> usize {
    vectors::DENSE_DIM
}
fn default_embedding_batch() -> usize {
    64
}
fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            endpoint: default_llm_endpoint(),
            api_key: default_llm_api_key(),
            model: default_embedding_model(),
            dimension: default_dense_dim(),
            batch_size: default_embedding_batch(),
            query_instruction: None,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// BM25 sparse encoder parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseSettings {
    #[serde(default = "default_k1")]
    pub k1: f32,

    #[serde(default = "default_b")]
    pub b: f32,

    #[serde(default = "default_avg_doc_len")]
    pub avg_doc_len: f32,

    #[serde(default = "default_true")]
    pub stemming: bool,
}

fn default_k1() -> f32 {
    bm25::K1
}
fn default_b() -> f32 {
    bm25::B
}
fn default_avg_doc_len() -> f32 {
    bm25::AVG_DOC_LEN
}

impl Default for SparseSettings {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            avg_doc_len: default_avg_doc_len(),
            stemming: true,
        }
    }
}

/// Hybrid index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    /// Process-local index, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_dense_name")]
    pub dense_vector_name: String,

    #[serde(default = "default_sparse_name")]
    pub sparse_vector_name: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Fusion constant for the in-memory backend
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

fn default_qdrant_url() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    vectors::COLLECTION.to_string()
}
fn default_dense_name() -> String {
    vectors::DENSE_NAME.to_string()
}
fn default_sparse_name() -> String {
    vectors::SPARSE_NAME.to_string()
}
fn default_store_timeout() -> u64 {
    10
}
fn default_rrf_k() -> f32 {
    retrieval::RRF_K
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            dense_vector_name: default_dense_name(),
            sparse_vector_name: default_sparse_name(),
            timeout_secs: default_store_timeout(),
            rrf_k: default_rrf_k(),
        }
    }
}

/// Reranker backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerankerProvider {
    /// Infinity-compatible HTTP service
    #[default]
    Infinity,
    /// Keyword overlap, no model
    Lexical,
    /// Local ONNX cross-encoder (requires the `onnx` feature)
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerSettings {
    #[serde(default)]
    pub provider: RerankerProvider,

    #[serde(default = "default_reranker_url")]
    pub base_url: String,

    #[serde(default = "default_reranker_model")]
    pub model: String,

    #[serde(default = "default_reranker_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub model_path: Option<String>,

    #[serde(default)]
    pub tokenizer_path: Option<String>,

    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
}

fn default_reranker_url() -> String {
    endpoints::RERANKER_DEFAULT.to_string()
}
fn default_reranker_model() -> String {
    models::RERANKER_MODEL.to_string()
}
fn default_reranker_timeout() -> u64 {
    retrieval::RERANK_TIMEOUT_MS / 1000
}
fn default_max_seq_len() -> usize {
    512
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            provider: RerankerProvider::default(),
            base_url: default_reranker_url(),
            model: default_reranker_model(),
            timeout_secs: default_reranker_timeout(),
            model_path: None,
            tokenizer_path: None,
            max_seq_len: default_max_seq_len(),
        }
    }
}

/// Retrieval orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverSettings {
    /// Candidates per hybrid search
    #[serde(default = "default_initial_limit")]
    pub initial_limit: usize,

    /// Passages kept after reranking
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    /// Run per-query searches concurrently
    #[serde(default = "default_true")]
    pub parallel_search: bool,

    #[serde(default = "default_search_timeout")]
    pub search_timeout_ms: u64,

    #[serde(default = "default_rerank_timeout")]
    pub rerank_timeout_ms: u64,
}

fn default_initial_limit() -> usize {
    retrieval::INITIAL_LIMIT
}
fn default_final_top_k() -> usize {
    retrieval::FINAL_TOP_K
}
fn default_search_timeout() -> u64 {
    retrieval::SEARCH_TIMEOUT_MS
}
fn default_rerank_timeout() -> u64 {
    retrieval::RERANK_TIMEOUT_MS
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            initial_limit: default_initial_limit(),
            final_top_k: default_final_top_k(),
            parallel_search: true,
            search_timeout_ms: default_search_timeout(),
            rerank_timeout_ms: default_rerank_timeout(),
        }
    }
}

/// Query expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Also search with the unexpanded question
    #[serde(default)]
    pub include_original: bool,
}

fn default_max_queries() -> usize {
    5
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            include_original: false,
        }
    }
}

/// Answer cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl() -> u64 {
    3600
}
fn default_cache_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics on `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_retrieval()?;
        self.validate_sparse()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "Port cannot be 0"));
        }

        if !(1..=2000).contains(&self.server.max_question_chars) {
            return Err(invalid(
                "server.max_question_chars",
                format!("Must be between 1 and 2000, got {}", self.server.max_question_chars),
            ));
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let missing_key = self.llm.provider == LlmProvider::OpenAI
            && self.llm.api_key.as_deref().map_or(true, str::is_empty)
            && !self.llm.endpoint.starts_with("http://localhost");

        if missing_key {
            if self.environment.is_strict() {
                return Err(ConfigError::MissingField("llm.api_key".to_string()));
            }
            tracing::warn!(
                endpoint = %self.llm.endpoint,
                "No LLM API key configured for remote endpoint"
            );
        }

        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs", "Timeout cannot be 0"));
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retriever;

        if r.initial_limit == 0 {
            return Err(invalid("retriever.initial_limit", "Must be at least 1"));
        }

        if r.final_top_k == 0 {
            return Err(invalid("retriever.final_top_k", "Must be at least 1"));
        }

        if r.final_top_k > r.initial_limit {
            return Err(invalid(
                "retriever.final_top_k",
                format!(
                    "final_top_k ({}) cannot exceed initial_limit ({})",
                    r.final_top_k, r.initial_limit
                ),
            ));
        }

        if r.search_timeout_ms == 0 || r.rerank_timeout_ms == 0 {
            return Err(invalid("retriever", "Timeouts must be positive"));
        }

        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "Must be at least 1"));
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "Must be at least 1"));
        }

        if self.expansion.max_queries == 0 {
            return Err(invalid("expansion.max_queries", "Must be at least 1"));
        }

        if self.vector_store.rrf_k <= 0.0 {
            return Err(invalid(
                "vector_store.rrf_k",
                format!("Must be positive, got {}", self.vector_store.rrf_k),
            ));
        }

        Ok(())
    }

    fn validate_sparse(&self) -> Result<(), ConfigError> {
        let s = &self.sparse;

        if s.k1 <= 0.0 {
            return Err(invalid("sparse.k1", format!("Must be positive, got {}", s.k1)));
        }

        if !(0.0..=1.0).contains(&s.b) {
            return Err(invalid(
                "sparse.b",
                format!("Must be between 0.0 and 1.0, got {}", s.b),
            ));
        }

        if s.avg_doc_len <= 0.0 {
            return Err(invalid("sparse.avg_doc_len", "Must be positive"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`ASKDOCS__` prefix, `__` separated)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("ASKDOCS")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
