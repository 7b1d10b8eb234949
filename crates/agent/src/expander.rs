//! Query expansion
//!
//! Rewrites a question into several search queries for recall. Failure is
//! an ordinary `Err`; the pipeline decides the fallback.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use askdocs_config::ExpansionConfig;
use askdocs_core::{ExpandedQuerySet, Question};
use askdocs_llm::{invoke_structured, LlmBackend, LlmError, StructuredOutput};

use crate::prompts::EXPANSION_SYSTEM_PROMPT;

#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("Expansion call failed: {0}")]
    Llm(String),

    #[error("Expansion produced no usable queries")]
    Empty,
}

impl From<LlmError> for ExpansionError {
    fn from(err: LlmError) -> Self {
        ExpansionError::Llm(err.to_string())
    }
}

/// Expander reply
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteResult {
    pub queries: Vec<String>,
}

impl StructuredOutput for RewriteResult {
    const NAME: &'static str = "rewrite_result";

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Search queries optimized for recall"
                }
            },
            "required": ["queries"],
            "additionalProperties": false
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    /// Upper bound on queries kept from the reply
    pub max_queries: usize,
    /// Prepend the question itself to the expanded queries
    pub include_original: bool,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self::from(&ExpansionConfig::default())
    }
}

impl From<&ExpansionConfig> for ExpanderConfig {
    fn from(config: &ExpansionConfig) -> Self {
        Self {
            max_queries: config.max_queries.max(1),
            include_original: config.include_original,
        }
    }
}

pub struct QueryExpander {
    llm: Arc<dyn LlmBackend>,
    config: ExpanderConfig,
}

impl QueryExpander {
    pub fn new(llm: Arc<dyn LlmBackend>, config: ExpanderConfig) -> Self {
        Self { llm, config }
    }

    pub async fn expand(&self, question: &Question) -> Result<ExpandedQuerySet, ExpansionError> {
        let reply: RewriteResult =
            invoke_structured(self.llm.as_ref(), EXPANSION_SYSTEM_PROMPT, question.as_str())
                .await?;

        let queries = self.sanitize(question, reply.queries);
        if queries.is_empty() {
            return Err(ExpansionError::Empty);
        }

        tracing::debug!(count = queries.len(), queries = ?queries, "Expanded question");
        Ok(ExpandedQuerySet::new(queries))
    }

    /// Trim, drop blanks and exact repeats, cap the count
    fn sanitize(&self, question: &Question, raw: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();

        let original = self
            .config
            .include_original
            .then(|| question.as_str().to_string());

        let generated = raw
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let mut queries: Vec<String> = original
            .into_iter()
            .chain(generated)
            .filter(|q| seen.insert(q.clone()))
            .collect();

        // Nothing generated: the original alone is not an expansion
        if self.config.include_original && queries.len() == 1 {
            queries.clear();
        }

        queries.truncate(self.config.max_queries);
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn question() -> Question {
        Question::new("How does hybrid search rank results?").unwrap()
    }

    fn expander(reply: &str, config: ExpanderConfig) -> QueryExpander {
        QueryExpander::new(Arc::new(ScriptedLlm::replying(reply)), config)
    }

    #[tokio::test]
    async fn test_expand_returns_queries() {
        let expander = expander(
            r#"{"queries": ["hybrid search ranking", "RRF fusion", "dense sparse retrieval"]}"#,
            ExpanderConfig::default(),
        );

        let set = expander.expand(&question()).await.unwrap();
        assert_eq!(
            set.as_slice(),
            ["hybrid search ranking", "RRF fusion", "dense sparse retrieval"]
        );
    }

    #[tokio::test]
    async fn test_sanitize_trims_dedups_and_caps() {
        let expander = expander(
            r#"{"queries": [" a ", "", "a", "b", "c", "d"]}"#,
            ExpanderConfig {
                max_queries: 3,
                include_original: false,
            },
        );

        let set = expander.expand(&question()).await.unwrap();
        assert_eq!(set.as_slice(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_include_original_goes_first() {
        let expander = expander(
            r#"{"queries": ["rrf"]}"#,
            ExpanderConfig {
                max_queries: 5,
                include_original: true,
            },
        );

        let set = expander.expand(&question()).await.unwrap();
        assert_eq!(set.as_slice(), ["How does hybrid search rank results?", "rrf"]);
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let expander = expander(r#"{"queries": ["  ", ""]}"#, ExpanderConfig::default());
        assert!(matches!(
            expander.expand(&question()).await,
            Err(ExpansionError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_llm_failure_is_error() {
        let expander = QueryExpander::new(Arc::new(ScriptedLlm::failing()), ExpanderConfig::default());
        assert!(matches!(
            expander.expand(&question()).await,
            Err(ExpansionError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_error() {
        let expander = expander(r#"{"query": "oops"}"#, ExpanderConfig::default());
        assert!(expander.expand(&question()).await.is_err());
    }
}
