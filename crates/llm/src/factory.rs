//! Backend construction from settings

use std::sync::Arc;
use std::time::Duration;

use askdocs_config::{LlmProvider, LlmSettings};

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// Build a backend for `model` at `temperature` using the shared LLM settings
pub fn create_backend(
    settings: &LlmSettings,
    model: &str,
    temperature: f32,
) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let timeout = Duration::from_secs(settings.timeout_secs);

    let backend: Arc<dyn LlmBackend> = match settings.provider {
        LlmProvider::OpenAI => Arc::new(OpenAIBackend::new(OpenAIConfig {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: model.to_string(),
            max_tokens: settings.max_tokens,
            temperature,
            timeout,
            max_retries: settings.max_retries,
            ..Default::default()
        })?),
        LlmProvider::Ollama => Arc::new(OllamaBackend::new(LlmConfig {
            model: model.to_string(),
            endpoint: settings.endpoint.clone(),
            max_tokens: settings.max_tokens,
            temperature,
            timeout,
            max_retries: settings.max_retries,
            ..Default::default()
        })?),
    };

    tracing::debug!(
        provider = ?settings.provider,
        model = backend.model_name(),
        "Created LLM backend"
    );

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_backend() {
        let settings = LlmSettings {
            provider: LlmProvider::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            ..Default::default()
        };
        let backend = create_backend(&settings, "llama3.1", 0.0).unwrap();
        assert_eq!(backend.model_name(), "llama3.1");
    }

    #[test]
    fn test_create_openai_requires_key() {
        let settings = LlmSettings {
            provider: LlmProvider::OpenAI,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            ..Default::default()
        };
        assert!(create_backend(&settings, "gpt-4o", 0.0).is_err());

        let settings = LlmSettings {
            api_key: Some("sk-test".to_string()),
            ..settings
        };
        let backend = create_backend(&settings, "gpt-4o", 0.0).unwrap();
        assert_eq!(backend.model_name(), "gpt-4o");
    }
}
