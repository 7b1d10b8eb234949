//! BM25 sparse encoding
//!
//! Text is analyzed with a tantivy pipeline (simple tokenizer, long-token
//! removal, lowercasing, stopword removal, English stemming). Each term is
//! hashed to a stable `u32` index.
//!
//! Document vectors carry the BM25 term-frequency component only:
//!
//! ```text
//! w(t, d) = tf * (k1 + 1) / (tf + k1 * (1 - b + b * |d| / avgdl))
//! ```
//!
//! Query vectors weight each distinct term 1.0. The IDF factor is applied
//! by the index at query time, so `dot(query, doc)` over an IDF-aware index
//! yields the usual BM25 score.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer, TokenStream,
};

use askdocs_config::constants::bm25;
use askdocs_config::SparseSettings;
use askdocs_core::{SparseEncoder, SparseVector};

use crate::stopwords;

/// BM25 parameters
#[derive(Debug, Clone)]
pub struct Bm25Config {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength
    pub b: f32,
    /// Expected document length in tokens
    pub avg_doc_len: f32,
    /// Apply English stemming
    pub stemming: bool,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: bm25::K1,
            b: bm25::B,
            avg_doc_len: bm25::AVG_DOC_LEN,
            stemming: true,
        }
    }
}

impl From<&SparseSettings> for Bm25Config {
    fn from(settings: &SparseSettings) -> Self {
        Self {
            k1: settings.k1,
            b: settings.b,
            avg_doc_len: settings.avg_doc_len,
            stemming: settings.stemming,
        }
    }
}

/// BM25 sparse encoder
#[derive(Clone)]
pub struct Bm25Encoder {
    analyzer: TextAnalyzer,
    config: Bm25Config,
}

impl Bm25Encoder {
    pub fn new(config: Bm25Config) -> Self {
        Self {
            analyzer: Self::build_analyzer(&config),
            config,
        }
    }

    fn build_analyzer(config: &Bm25Config) -> TextAnalyzer {
        let base = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(
                stopwords::ENGLISH.iter().map(|w| w.to_string()),
            ));

        if config.stemming {
            base.filter(Stemmer::new(Language::English)).build()
        } else {
            base.build()
        }
    }

    /// Analyzed terms of `text`, in order
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut terms = Vec::new();
        stream.process(&mut |token| terms.push(token.text.clone()));
        terms
    }

    /// Encode a passage for indexing
    pub fn encode_document(&self, text: &str) -> SparseVector {
        let terms = self.tokenize(text);
        if terms.is_empty() {
            return SparseVector::default();
        }

        let mut tf: BTreeMap<u32, f32> = BTreeMap::new();
        for term in &terms {
            *tf.entry(term_index(term)).or_insert(0.0) += 1.0;
        }

        let Bm25Config { k1, b, avg_doc_len, .. } = self.config;
        let length_norm = 1.0 - b + b * terms.len() as f32 / avg_doc_len;

        let (indices, values) = tf
            .into_iter()
            .map(|(idx, freq)| (idx, freq * (k1 + 1.0) / (freq + k1 * length_norm)))
            .unzip();

        SparseVector::new(indices, values)
    }

    /// Encode a search query: each distinct term weighs 1.0
    pub fn encode_query_text(&self, text: &str) -> SparseVector {
        let mut indices: Vec<u32> = self.tokenize(text).iter().map(|t| term_index(t)).collect();
        indices.sort_unstable();
        indices.dedup();

        let values = vec![1.0; indices.len()];
        SparseVector::new(indices, values)
    }
}

impl Default for Bm25Encoder {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}

#[async_trait]
impl SparseEncoder for Bm25Encoder {
    async fn encode(&self, texts: &[String]) -> askdocs_core::Result<Vec<SparseVector>> {
        Ok(texts.iter().map(|t| self.encode_document(t)).collect())
    }

    async fn encode_query(&self, text: &str) -> askdocs_core::Result<SparseVector> {
        Ok(self.encode_query_text(text))
    }
}

/// 32-bit FNV-1a hash of a term
pub fn term_index(term: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    term.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u32).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_filters_and_stems() {
        let encoder = Bm25Encoder::default();
        let terms = encoder.tokenize("The Running dogs are RUNNING");
        assert_eq!(terms, vec!["run", "dog", "run"]);
    }

    #[test]
    fn test_tokenize_without_stemming() {
        let encoder = Bm25Encoder::new(Bm25Config {
            stemming: false,
            ..Default::default()
        });
        assert_eq!(encoder.tokenize("Running dogs"), vec!["running", "dogs"]);
    }

    #[test]
    fn test_document_vector_sorted_unique() {
        let encoder = Bm25Encoder::default();
        let vector = encoder.encode_document("rust rust async tokio runtime rust");

        assert_eq!(vector.len(), 4);
        assert!(vector.indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(vector.indices.len(), vector.values.len());
    }

    #[test]
    fn test_term_frequency_saturates() {
        let encoder = Bm25Encoder::default();
        let vector = encoder.encode_document("rust rust rust tokio");

        let rust = vector.iter().find(|(i, _)| *i == term_index("rust")).unwrap().1;
        let tokio = vector.iter().find(|(i, _)| *i == term_index("tokio")).unwrap().1;

        assert!(rust > tokio);
        // Bounded by k1 + 1
        assert!(rust < bm25::K1 + 1.0);
    }

    #[test]
    fn test_longer_documents_weigh_less() {
        let encoder = Bm25Encoder::default();
        let short = encoder.encode_document("qdrant");
        let long = encoder.encode_document(&format!("qdrant {}", "filler ".repeat(500)));

        let idx = term_index("qdrant");
        let short_w = short.iter().find(|(i, _)| *i == idx).unwrap().1;
        let long_w = long.iter().find(|(i, _)| *i == idx).unwrap().1;
        assert!(short_w > long_w);
    }

    #[test]
    fn test_query_vector_unit_weights() {
        let encoder = Bm25Encoder::default();
        let vector = encoder.encode_query_text("what is hybrid search in hybrid systems");

        assert!(vector.values.iter().all(|&v| v == 1.0));
        // "hybrid" appears twice but is encoded once
        assert_eq!(vector.len(), 3);
    }

    #[test]
    fn test_stopword_only_text_is_empty() {
        let encoder = Bm25Encoder::default();
        assert!(encoder.encode_document("the and of").is_empty());
        assert!(encoder.encode_query_text("").is_empty());
    }

    #[test]
    fn test_term_index_stable() {
        assert_eq!(term_index(""), 0x811c_9dc5);
        assert_eq!(term_index("a"), 0xe40c_292c);
        assert_ne!(term_index("rust"), term_index("tokio"));
    }
}
