//! Backend traits consumed by the retrieval pipeline
//!
//! All traits are async and object-safe so implementations can be swapped
//! behind `Arc<dyn ...>`.

mod encoder;
mod index;
mod reranker;

pub use encoder::{DenseEncoder, SparseEncoder, SparseVector};
pub use index::{HybridIndex, IndexPoint, PointPayload};
pub use reranker::{RerankHit, Reranker};
