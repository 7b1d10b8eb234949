//! Core traits and types for askdocs
//!
//! This crate provides the foundation shared by every other crate:
//! - Domain types threaded through the answering pipeline
//! - Pluggable backend traits (encoders, hybrid index, reranker)
//! - Error types

pub mod error;
pub mod passage;
pub mod question;
pub mod state;
pub mod traits;

pub use error::{Error, Result};
pub use passage::{Passage, ScoredPassage};
pub use question::{ExpandedQuerySet, Question, MAX_QUESTION_CHARS};
pub use state::{PipelineState, RoutingDecision};
pub use traits::{
    DenseEncoder, HybridIndex, IndexPoint, PointPayload, RerankHit, Reranker, SparseEncoder,
    SparseVector,
};
