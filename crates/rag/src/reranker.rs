//! Cross-encoder reranking
//!
//! Three backends implement [`Reranker`]:
//! - `HttpReranker`: Infinity-compatible `POST /rerank` service
//! - `CrossEncoderReranker`: local ONNX cross-encoder (`onnx` feature)
//! - `LexicalReranker`: keyword-overlap scoring, no model
//!
//! All of them return hits sorted by descending score with ties kept in
//! input order, truncated to `top_k`. Empty input never reaches a model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use askdocs_config::constants::{endpoints, models};
use askdocs_config::RerankerSettings;
use askdocs_core::{RerankHit, Reranker};

use crate::stopwords::is_stopword;
use crate::RagError;

#[cfg(feature = "onnx")]
pub use self::onnx::CrossEncoderReranker;

/// Stable descending sort, then keep the first `top_k`
fn sort_and_truncate(mut hits: Vec<RerankHit>, top_k: usize) -> Vec<RerankHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

// =============================================================================
// Infinity-compatible HTTP reranker
// =============================================================================

#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpRerankerConfig {
    fn default() -> Self {
        Self {
            base_url: endpoints::RERANKER_DEFAULT.to_string(),
            model: models::RERANKER_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&RerankerSettings> for HttpRerankerConfig {
    fn from(settings: &RerankerSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    return_documents: bool,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Reranker backed by an Infinity-compatible service
pub struct HttpReranker {
    client: Client,
    config: HttpRerankerConfig,
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/rerank", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankHit>, RagError> {
        let request = RerankRequest {
            model: &self.config.model,
            query,
            documents,
            return_documents: false,
            top_n: top_k,
        };

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::Timeout(format!("Rerank request: {}", e))
                } else {
                    RagError::Reranker(format!("Rerank request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Reranker(format!(
                "Rerank request failed: {} - {}",
                status, text
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| RagError::Reranker(format!("Failed to parse rerank response: {}", e)))?;

        hits_from_results(parsed.results, documents)
    }
}

/// Map service results back onto the submitted documents
fn hits_from_results(
    results: Vec<RerankResult>,
    documents: &[String],
) -> Result<Vec<RerankHit>, RagError> {
    results
        .into_iter()
        .map(|r| {
            let document = documents.get(r.index).ok_or_else(|| {
                RagError::Reranker(format!(
                    "Rerank result index {} out of range ({} documents)",
                    r.index,
                    documents.len()
                ))
            })?;

            Ok(RerankHit {
                index: r.index,
                document: document.clone(),
                score: r.relevance_score,
            })
        })
        .collect()
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> askdocs_core::Result<Vec<RerankHit>> {
        if documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.request(query, documents, top_k).await?;

        tracing::debug!(
            model = %self.config.model,
            candidates = documents.len(),
            returned = hits.len(),
            "Reranked via HTTP"
        );

        Ok(sort_and_truncate(hits, top_k))
    }

    fn name(&self) -> &str {
        "infinity"
    }
}

// =============================================================================
// Lexical reranker
// =============================================================================

/// Keyword-overlap scorer
///
/// Per matched query term:
/// - term frequency: `sqrt(count in document)`
/// - specificity: `ln(1 + term length)`
/// - query position: `1 / (1 + 0.1 * pos)`
/// - document length: `1 / (1 + sqrt(words / 50))`
///
/// plus `0.3 * coverage` for the fraction of query terms matched. The raw
/// sum `s` is squashed to `s / (s + 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect()
    }

    pub fn score(query: &str, document: &str) -> f32 {
        let query_terms: Vec<String> = Self::words(query)
            .into_iter()
            .filter(|w| w.chars().count() > 1 && !is_stopword(w))
            .collect();

        if query_terms.is_empty() {
            return 0.0;
        }

        let doc_words = Self::words(document);
        let doc_len = doc_words.len().max(1) as f32;
        let length_norm = 1.0 / (1.0 + (doc_len / 50.0).sqrt());

        let mut total = 0.0f32;
        let mut matched = 0usize;

        for (pos, term) in query_terms.iter().enumerate() {
            let tf = doc_words.iter().filter(|w| *w == term).count() as f32;
            if tf == 0.0 {
                continue;
            }

            matched += 1;
            let specificity = (1.0 + term.chars().count() as f32).ln();
            let position_weight = 1.0 / (1.0 + pos as f32 * 0.1);
            total += tf.sqrt() * specificity * position_weight * length_norm;
        }

        let coverage = matched as f32 / query_terms.len() as f32;
        let raw = total + coverage * 0.3;
        raw / (raw + 1.0)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> askdocs_core::Result<Vec<RerankHit>> {
        let hits = documents
            .iter()
            .enumerate()
            .map(|(index, document)| RerankHit {
                index,
                document: document.clone(),
                score: Self::score(query, document),
            })
            .collect();

        Ok(sort_and_truncate(hits, top_k))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

// =============================================================================
// ONNX cross-encoder
// =============================================================================

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ndarray::Array2;
    use ort::{session::builder::GraphOptimizationLevel, session::Session, value::Tensor};
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;

    use askdocs_core::{RerankHit, Reranker};

    use super::sort_and_truncate;
    use crate::RagError;

    /// Cross-encoder running on ONNX Runtime
    ///
    /// Inference is CPU-bound and runs on the blocking thread pool.
    pub struct CrossEncoderReranker {
        session: Arc<Mutex<Session>>,
        tokenizer: Arc<Tokenizer>,
        max_seq_len: usize,
    }

    impl CrossEncoderReranker {
        pub fn new(
            model_path: impl AsRef<Path>,
            tokenizer_path: impl AsRef<Path>,
            max_seq_len: usize,
        ) -> Result<Self, RagError> {
            let session = Session::builder()
                .map_err(|e| RagError::Model(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| RagError::Model(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e| RagError::Model(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e| RagError::Model(e.to_string()))?;

            let tokenizer =
                Tokenizer::from_file(tokenizer_path).map_err(|e| RagError::Model(e.to_string()))?;

            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                max_seq_len,
            })
        }

        fn score_pair(
            session: &Mutex<Session>,
            tokenizer: &Tokenizer,
            max_seq_len: usize,
            query: &str,
            document: &str,
        ) -> Result<f32, RagError> {
            let encoding = tokenizer
                .encode((query, document), true)
                .map_err(|e| RagError::Reranker(e.to_string()))?;

            let ids: Vec<i64> = encoding
                .get_ids()
                .iter()
                .take(max_seq_len)
                .map(|&id| id as i64)
                .collect();

            let mut padded_ids = vec![0i64; max_seq_len];
            let mut padded_mask = vec![0i64; max_seq_len];
            padded_ids[..ids.len()].copy_from_slice(&ids);
            padded_mask[..ids.len()].fill(1);

            let input_ids = Array2::from_shape_vec((1, max_seq_len), padded_ids)
                .map_err(|e| RagError::Reranker(e.to_string()))?;
            let attention = Array2::from_shape_vec((1, max_seq_len), padded_mask)
                .map_err(|e| RagError::Reranker(e.to_string()))?;

            let input_ids =
                Tensor::from_array(input_ids).map_err(|e| RagError::Model(e.to_string()))?;
            let attention =
                Tensor::from_array(attention).map_err(|e| RagError::Model(e.to_string()))?;

            let session = session.lock();
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "attention_mask" => attention,
                ])
                .map_err(|e| RagError::Model(e.to_string()))?;

            let (_, logits) = outputs
                .get("logits")
                .ok_or_else(|| RagError::Model("Missing logits output".to_string()))?
                .try_extract_tensor::<f32>()
                .map_err(|e| RagError::Model(e.to_string()))?;

            Ok(relevance(logits))
        }
    }

    /// Softmax probability of the "relevant" class, or sigmoid of a single logit
    fn relevance(logits: &[f32]) -> f32 {
        match logits.len() {
            0 => 0.0,
            1 => 1.0 / (1.0 + (-logits[0]).exp()),
            _ => {
                let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let exp_sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
                (logits[1] - max).exp() / exp_sum
            },
        }
    }

    #[async_trait]
    impl Reranker for CrossEncoderReranker {
        async fn rerank(
            &self,
            query: &str,
            documents: &[String],
            top_k: usize,
        ) -> askdocs_core::Result<Vec<RerankHit>> {
            if documents.is_empty() || top_k == 0 {
                return Ok(Vec::new());
            }

            let session = Arc::clone(&self.session);
            let tokenizer = Arc::clone(&self.tokenizer);
            let max_seq_len = self.max_seq_len;
            let query = query.to_string();
            let documents = documents.to_vec();

            let hits = tokio::task::spawn_blocking(move || {
                documents
                    .into_iter()
                    .enumerate()
                    .map(|(index, document)| {
                        let score =
                            Self::score_pair(&session, &tokenizer, max_seq_len, &query, &document)?;
                        Ok(RerankHit {
                            index,
                            document,
                            score,
                        })
                    })
                    .collect::<Result<Vec<_>, RagError>>()
            })
            .await
            .map_err(|e| RagError::Model(format!("Reranker task failed: {}", e)))??;

            Ok(sort_and_truncate(hits, top_k))
        }

        fn name(&self) -> &str {
            "onnx"
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_lexical_score_prefers_specific_match() {
        let specific = LexicalReranker::score(
            "qdrant sparse vector modifier",
            "Qdrant applies the IDF modifier to each sparse vector.",
        );
        let generic = LexicalReranker::score(
            "qdrant sparse vector modifier",
            "Databases offer many storage products to customers.",
        );
        assert!(specific > generic);
        assert_eq!(generic, 0.0);
    }

    #[test]
    fn test_lexical_score_bounded() {
        let score = LexicalReranker::score("rust", &"rust ".repeat(200));
        assert!(score > 0.0 && score < 1.0);
        assert_eq!(LexicalReranker::score("the of and", "the of and"), 0.0);
    }

    #[tokio::test]
    async fn test_lexical_rerank_sorted_and_truncated() {
        let documents = docs(&[
            "bread recipes",
            "tokio async runtime internals",
            "async runtime",
        ]);

        let hits = LexicalReranker
            .rerank("tokio async runtime", &documents, 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].document, "tokio async runtime internals");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_empty_documents_yield_empty() {
        let hits = LexicalReranker.rerank("anything", &[], 5).await.unwrap();
        assert!(hits.is_empty());

        let http = HttpReranker::new(HttpRerankerConfig {
            // Unroutable: any request would fail
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(http.rerank("anything", &[], 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let hits = vec![
            RerankHit { index: 0, document: "a".into(), score: 0.5 },
            RerankHit { index: 1, document: "b".into(), score: 0.9 },
            RerankHit { index: 2, document: "c".into(), score: 0.5 },
        ];
        let sorted = sort_and_truncate(hits, 10);
        let order: Vec<usize> = sorted.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_hits_from_results() {
        let documents = docs(&["first", "second"]);
        let results = vec![
            RerankResult { index: 1, relevance_score: 0.8 },
            RerankResult { index: 0, relevance_score: 0.1 },
        ];

        let hits = hits_from_results(results, &documents).unwrap();
        assert_eq!(hits[0].document, "second");
        assert_eq!(hits[1].document, "first");

        let bad = vec![RerankResult { index: 5, relevance_score: 0.8 }];
        assert!(hits_from_results(bad, &documents).is_err());
    }

    #[test]
    fn test_request_shape() {
        let documents = docs(&["d"]);
        let body = serde_json::to_value(RerankRequest {
            model: "m",
            query: "q",
            documents: &documents,
            return_documents: false,
            top_n: 5,
        })
        .unwrap();

        assert_eq!(body["top_n"], 5);
        assert_eq!(body["documents"][0], "d");
    }

    #[test]
    fn test_config_from_settings() {
        let settings = RerankerSettings::default();
        let config = HttpRerankerConfig::from(&settings);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.model, models::RERANKER_MODEL);
    }
}
