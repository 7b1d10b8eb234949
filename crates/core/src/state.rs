//! Per-invocation pipeline state

use serde::{Deserialize, Serialize};

use crate::{ExpandedQuerySet, Question, ScoredPassage};

/// Outcome of routing a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Needs document retrieval
    Retrieve,
    /// Answerable from general knowledge
    Direct,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::Retrieve => "retrieve",
            RoutingDecision::Direct => "direct",
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data threaded through one answering invocation
///
/// Created at START with only the question set. Each stage merges its
/// output into exactly one field; nothing outlives the invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub question: Question,
    pub optimized_queries: ExpandedQuerySet,
    pub retrieved_docs: Vec<ScoredPassage>,
    pub final_answer: String,
}

impl PipelineState {
    pub fn new(question: Question) -> Self {
        Self {
            question,
            optimized_queries: ExpandedQuerySet::default(),
            retrieved_docs: Vec::new(),
            final_answer: String::new(),
        }
    }

    /// Retrieved passage contents in rank order
    pub fn retrieved_contents(&self) -> Vec<String> {
        self.retrieved_docs
            .iter()
            .map(|doc| doc.passage.content.clone())
            .collect()
    }
}
