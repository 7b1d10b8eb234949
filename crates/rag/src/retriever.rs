//! Multi-query retrieval orchestration
//!
//! For one question and its expanded queries:
//!
//! 1. Run one hybrid search per query (concurrently when configured).
//! 2. Pool the results, dropping passages whose content was already seen.
//!    The pool follows query submission order, then each query's result
//!    order, regardless of which search finished first.
//! 3. Rerank the pool against the original question and keep the top-k,
//!    ranked 1..N by descending score.
//!
//! A failed search is logged and skipped. Only when every search fails is
//! [`RagError::RetrievalUnavailable`] returned, so "index down" stays
//! distinguishable from "nothing relevant".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use askdocs_config::constants::retrieval;
use askdocs_config::RetrieverSettings;
use askdocs_core::{ExpandedQuerySet, Passage, Question, RerankHit, Reranker, ScoredPassage};

use crate::search::HybridSearch;
use crate::{with_timeout, RagError};

/// Retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Candidates requested from each hybrid search
    pub initial_limit: usize,
    /// Passages kept after reranking
    pub final_top_k: usize,
    /// Issue per-query searches concurrently
    pub parallel_search: bool,
    pub search_timeout: Duration,
    pub rerank_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            initial_limit: retrieval::INITIAL_LIMIT,
            final_top_k: retrieval::FINAL_TOP_K,
            parallel_search: true,
            search_timeout: Duration::from_millis(retrieval::SEARCH_TIMEOUT_MS),
            rerank_timeout: Duration::from_millis(retrieval::RERANK_TIMEOUT_MS),
        }
    }
}

impl From<&RetrieverSettings> for RetrieverConfig {
    fn from(settings: &RetrieverSettings) -> Self {
        Self {
            initial_limit: settings.initial_limit,
            final_top_k: settings.final_top_k,
            parallel_search: settings.parallel_search,
            search_timeout: Duration::from_millis(settings.search_timeout_ms),
            rerank_timeout: Duration::from_millis(settings.rerank_timeout_ms),
        }
    }
}

/// Flatten result batches, keeping the first passage for each distinct content
///
/// Content is compared exactly; no trimming or case folding.
pub fn dedup_by_content<I>(batches: I) -> Vec<Passage>
where
    I: IntoIterator<Item = Vec<Passage>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut pool = Vec::new();

    for passage in batches.into_iter().flatten() {
        if seen.insert(passage.content.clone()) {
            pool.push(passage);
        }
    }

    pool
}

/// Two-stage retriever: hybrid search per query, then rerank the pool
pub struct RetrievalOrchestrator {
    searcher: Arc<dyn HybridSearch>,
    reranker: Arc<dyn Reranker>,
    config: RetrieverConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        searcher: Arc<dyn HybridSearch>,
        reranker: Arc<dyn Reranker>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            searcher,
            reranker,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve the final ranked passages for `question`
    ///
    /// `queries` drive the searches; an empty set searches with the question
    /// itself. Reranking always scores against `question`.
    pub async fn retrieve(
        &self,
        question: &Question,
        queries: &ExpandedQuerySet,
    ) -> Result<Vec<ScoredPassage>, RagError> {
        let start = Instant::now();

        let queries: Vec<String> = if queries.is_empty() {
            vec![question.as_str().to_string()]
        } else {
            queries.iter().cloned().collect()
        };

        let pool = self.gather(&queries).await?;

        let ranked = if pool.is_empty() {
            Vec::new()
        } else {
            self.rerank(question, pool).await?
        };

        let elapsed = start.elapsed();
        metrics::histogram!("askdocs_retrieval_latency_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            queries = queries.len(),
            returned = ranked.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Retrieval complete"
        );

        Ok(ranked)
    }

    /// Stage 1: search every query and pool the deduplicated results
    async fn gather(&self, queries: &[String]) -> Result<Vec<Passage>, RagError> {
        let outcomes: Vec<Result<Vec<Passage>, RagError>> = if self.config.parallel_search {
            // join_all yields in input order, not completion order
            join_all(queries.iter().map(|q| self.search_one(q))).await
        } else {
            let mut outcomes = Vec::with_capacity(queries.len());
            for query in queries {
                outcomes.push(self.search_one(query).await);
            }
            outcomes
        };

        let attempted = outcomes.len();
        let mut batches = Vec::with_capacity(attempted);
        let mut last_error = None;

        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(passages) => batches.push(passages),
                Err(e) => {
                    metrics::counter!("askdocs_search_failures_total").increment(1);
                    tracing::warn!(query = %query, error = %e, "Hybrid search failed, skipping query");
                    last_error = Some(e);
                },
            }
        }

        if batches.is_empty() {
            let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
            tracing::error!(attempted, "All hybrid searches failed");
            return Err(RagError::RetrievalUnavailable {
                attempted,
                last_error,
            });
        }

        let fetched: usize = batches.iter().map(Vec::len).sum();
        let pool = dedup_by_content(batches);

        tracing::debug!(fetched, pooled = pool.len(), "Deduplicated candidate pool");
        Ok(pool)
    }

    async fn search_one(&self, query: &str) -> Result<Vec<Passage>, RagError> {
        with_timeout(
            "hybrid search",
            self.config.search_timeout,
            self.searcher.search(query, self.config.initial_limit),
        )
        .await
    }

    /// Stage 2: rerank the pool against the question
    async fn rerank(
        &self,
        question: &Question,
        pool: Vec<Passage>,
    ) -> Result<Vec<ScoredPassage>, RagError> {
        let documents: Vec<String> = pool.iter().map(|p| p.content.clone()).collect();

        let hits = with_timeout("rerank", self.config.rerank_timeout, async {
            self.reranker
                .rerank(question.as_str(), &documents, self.config.final_top_k)
                .await
                .map_err(RagError::from)
        })
        .await?;

        tracing::debug!(
            reranker = self.reranker.name(),
            pool = documents.len(),
            hits = hits.len(),
            "Reranked pool"
        );

        Ok(rank_hits(pool, hits, self.config.final_top_k))
    }
}

/// Attach reranker scores to pooled passages and assign ranks
///
/// Hits are resolved by index into the pool, falling back to a content
/// match when a provider reports an index that does not line up.
fn rank_hits(pool: Vec<Passage>, mut hits: Vec<RerankHit>, top_k: usize) -> Vec<ScoredPassage> {
    // Stable: equal scores keep the reranker's order
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));

    let by_content: HashMap<&str, usize> = pool
        .iter()
        .enumerate()
        .map(|(i, p)| (p.content.as_str(), i))
        .collect();

    let mut used = vec![false; pool.len()];
    let mut slots = Vec::with_capacity(hits.len().min(top_k));

    for hit in &hits {
        let slot = match pool.get(hit.index) {
            Some(p) if p.content == hit.document => Some(hit.index),
            _ => by_content.get(hit.document.as_str()).copied(),
        };

        match slot {
            Some(slot) if !used[slot] => {
                used[slot] = true;
                slots.push((slot, hit.score));
            },
            Some(_) => {},
            None => {
                tracing::warn!(index = hit.index, "Reranker returned an unknown document");
            },
        }

        if slots.len() == top_k {
            break;
        }
    }

    let mut pool: Vec<Option<Passage>> = pool.into_iter().map(Some).collect();

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(position, (slot, score))| {
            pool[slot].take().map(|passage| ScoredPassage {
                passage,
                score,
                rank: position + 1,
            })
        })
        .collect()
}
