//! # claimsight-vector
//!
//! Vector index adapter for ClaimSight.
//!
//! The [`VectorIndex`] trait owns one named collection of
//! (claim id, vector, payload) points in an external vector store. The
//! production implementation ([`QdrantIndex`]) speaks the Qdrant REST API;
//! [`InMemoryIndex`] backs tests.
//!
//! Collection schema (dimensionality, cosine distance) is fixed at creation
//! for the lifetime of the collection. Changing embedding dimensionality
//! means a new collection, never an in-place migration.

mod error;
mod memory;
mod point;
mod qdrant;

pub use error::VectorIndexError;
pub use memory::InMemoryIndex;
pub use point::{ClaimEmbedding, FieldMatch, PointPayload, ScoredPoint, SearchFilter};
pub use qdrant::{QdrantConfig, QdrantIndex};

use async_trait::async_trait;
use std::collections::BTreeMap;

/// Collection-level operations on the claim-embedding index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent. Idempotent; tolerates
    /// "already exists" races between concurrent writers.
    async fn ensure_collection(&self) -> Result<(), VectorIndexError>;

    /// Insert-or-replace points keyed by claim id. No-op on empty input.
    async fn upsert(&self, points: Vec<ClaimEmbedding>) -> Result<(), VectorIndexError>;

    /// Paginated full scan of every point with vector and payload.
    ///
    /// Returns an empty list when the collection does not yet exist.
    async fn fetch_all(&self) -> Result<Vec<ClaimEmbedding>, VectorIndexError>;

    /// Merge the new cluster id into each listed point's payload. Other
    /// payload fields survive. No-op on empty input.
    async fn patch_cluster_payload(
        &self,
        assignments: &BTreeMap<i64, i64>,
    ) -> Result<(), VectorIndexError>;

    /// Rank the `limit` nearest points to `vector`, optionally restricted by
    /// a structured payload filter.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorIndexError>;
}
