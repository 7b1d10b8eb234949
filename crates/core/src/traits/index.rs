//! Hybrid dense + sparse index

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::traits::SparseVector;
use crate::{Passage, Result};

/// Payload stored alongside a point's vectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A point to upsert
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

/// Store holding both vector kinds per point
///
/// `hybrid_query` fuses its dense and sparse candidate lists internally
/// and returns passages in fused order, best first.
#[async_trait]
pub trait HybridIndex: Send + Sync {
    /// Insert or replace points, returning how many were written
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<usize>;

    /// Fused nearest-neighbour query
    async fn hybrid_query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
    ) -> Result<Vec<Passage>>;

    /// Remove every point indexed from `source`, returning how many went
    async fn delete_by_source(&self, source: &str) -> Result<u64>;

    /// Number of stored points
    async fn count(&self) -> Result<u64>;

    /// Whether the index can serve queries
    async fn ready(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}
