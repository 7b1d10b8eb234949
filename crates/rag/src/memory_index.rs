//! In-process hybrid index
//!
//! Dense candidates are ranked by cosine similarity and sparse candidates
//! by an IDF-weighted dot product (BM25 when documents were encoded with
//! [`Bm25Encoder`](crate::Bm25Encoder)). The two lists are fused with RRF.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use askdocs_config::constants::retrieval;
use askdocs_core::{HybridIndex, IndexPoint, Passage, SparseVector};

use crate::fusion::reciprocal_rank_fusion;
use crate::RagError;

#[derive(Default)]
struct Inner {
    points: Vec<IndexPoint>,
    by_id: HashMap<String, usize>,
    /// Number of points containing each sparse index
    doc_freq: HashMap<u32, u32>,
}

impl Inner {
    fn add_doc_freq(&mut self, sparse: &SparseVector, delta: i64) {
        for idx in &sparse.indices {
            let entry = self.doc_freq.entry(*idx).or_insert(0);
            *entry = (*entry as i64 + delta).max(0) as u32;
        }
    }

    fn idf(&self, idx: u32) -> f32 {
        let n = self.points.len() as f32;
        let df = self.doc_freq.get(&idx).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

/// Hybrid index held in memory
pub struct InMemoryHybridIndex {
    inner: RwLock<Inner>,
    dimension: usize,
    rrf_k: f32,
}

impl InMemoryHybridIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dimension,
            rrf_k: retrieval::RRF_K,
        }
    }

    pub fn with_rrf_k(mut self, rrf_k: f32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    fn dense_ranking(inner: &Inner, query: &[f32], limit: usize) -> Vec<usize> {
        let query_norm = norm(query);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = inner
            .points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let n = norm(&p.dense);
                (n > 0.0).then(|| (i, dot(query, &p.dense) / (query_norm * n)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(limit).map(|(i, _)| i).collect()
    }

    fn sparse_ranking(inner: &Inner, query: &SparseVector, limit: usize) -> Vec<usize> {
        if query.is_empty() {
            return Vec::new();
        }

        let weights: HashMap<u32, f32> = query
            .iter()
            .map(|(idx, value)| (idx, value * inner.idf(idx)))
            .collect();

        let mut scored: Vec<(usize, f32)> = inner
            .points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let score: f32 = p
                    .sparse
                    .iter()
                    .filter_map(|(idx, value)| weights.get(&idx).map(|w| w * value))
                    .sum();
                (score > 0.0).then_some((i, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(limit).map(|(i, _)| i).collect()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

#[async_trait]
impl HybridIndex for InMemoryHybridIndex {
    async fn upsert(&self, points: Vec<IndexPoint>) -> askdocs_core::Result<usize> {
        if let Some(bad) = points.iter().find(|p| p.dense.len() != self.dimension) {
            return Err(RagError::VectorStore(format!(
                "Point {} has dimension {}, index expects {}",
                bad.id,
                bad.dense.len(),
                self.dimension
            ))
            .into());
        }

        let written = points.len();
        let mut inner = self.inner.write();

        for point in points {
            inner.add_doc_freq(&point.sparse, 1);
            match inner.by_id.get(&point.id).copied() {
                Some(slot) => {
                    let old = std::mem::replace(&mut inner.points[slot], point);
                    inner.add_doc_freq(&old.sparse, -1);
                },
                None => {
                    let slot = inner.points.len();
                    inner.by_id.insert(point.id.clone(), slot);
                    inner.points.push(point);
                },
            }
        }

        tracing::debug!(written, total = inner.points.len(), "Upserted points in memory");
        Ok(written)
    }

    async fn delete_by_source(&self, source: &str) -> askdocs_core::Result<u64> {
        let mut inner = self.inner.write();
        let before = inner.points.len();

        let (removed, kept): (Vec<IndexPoint>, Vec<IndexPoint>) = std::mem::take(&mut inner.points)
            .into_iter()
            .partition(|p| p.payload.source.as_deref() == Some(source));

        for point in &removed {
            inner.add_doc_freq(&point.sparse, -1);
        }
        inner.by_id = kept
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        inner.points = kept;

        let deleted = (before - inner.points.len()) as u64;
        tracing::debug!(source, deleted, "Deleted points in memory");
        Ok(deleted)
    }

    async fn hybrid_query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
    ) -> askdocs_core::Result<Vec<Passage>> {
        let inner = self.inner.read();

        let dense_ranked = Self::dense_ranking(&inner, dense, limit);
        let sparse_ranked = Self::sparse_ranking(&inner, sparse, limit);
        let fused = reciprocal_rank_fusion(&[dense_ranked, sparse_ranked], self.rrf_k, limit);

        Ok(fused
            .into_iter()
            .map(|(slot, _)| {
                let point = &inner.points[slot];
                Passage {
                    content: point.payload.content.clone(),
                    point_id: Some(point.id.clone()),
                    source: point.payload.source.clone(),
                }
            })
            .collect())
    }

    async fn count(&self) -> askdocs_core::Result<u64> {
        Ok(self.inner.read().points.len() as u64)
    }

    async fn ready(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "memory"
    }
}
