//! Configuration management for askdocs
//!
//! Settings are layered from:
//! - `config/default.yaml`
//! - `config/{env}.yaml` when an environment name is given
//! - Environment variables (`ASKDOCS__SECTION__KEY`)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, CacheConfig, EmbeddingConfig, EmbeddingProvider, ExpansionConfig, LlmProvider,
    LlmSettings, ObservabilityConfig, RerankerProvider, RerankerSettings, RetrieverSettings,
    RuntimeEnvironment, ServerConfig, Settings, SparseSettings, VectorBackend, VectorStoreConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
