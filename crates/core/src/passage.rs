//! Retrieved passage types

use serde::{Deserialize, Serialize};

/// Unit of retrieval: passage text plus the index point it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text. Deduplication compares this field exactly.
    pub content: String,
    /// Index point id, if the index reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_id: Option<String>,
    /// Source document the point was indexed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            point_id: None,
            source: None,
        }
    }

    pub fn with_point_id(mut self, id: impl Into<String>) -> Self {
        self.point_id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A passage with its reranker score and 1-based rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    /// Provider-defined relevance score, not normalized
    pub score: f32,
    /// 1-based position in descending score order
    pub rank: usize,
}

impl ScoredPassage {
    pub fn content(&self) -> &str {
        &self.passage.content
    }
}
