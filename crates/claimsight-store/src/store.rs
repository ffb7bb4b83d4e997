//! Claim and cluster store trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use claimsight_types::{Claim, Cluster, Explanation, NewCluster};

use crate::error::StoreError;

/// Per-component cost rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCost {
    /// Component name.
    pub component: String,
    /// Number of claims against the component.
    pub claim_count: i64,
    /// Summed claim cost in US dollars.
    pub total_cost_usd: f64,
}

/// Read/write access to warranty claims.
///
/// The pipeline only ever updates two claim columns: `embedded_at` (via
/// [`mark_embedded`](ClaimStore::mark_embedded)) and `cluster_id` (via
/// [`ClusterStore::replace_all`]).
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// All claims with `embedded_at` null, ordered by ascending id.
    ///
    /// Ascending order keeps embedding runs deterministic and makes partial
    /// failures easy to reason about.
    async fn unembedded_claims(&self) -> Result<Vec<Claim>, StoreError>;

    /// Stamp every listed claim with the same `embedded_at` timestamp,
    /// committed as one unit.
    async fn mark_embedded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Load claims by id. Unknown ids are silently absent from the result.
    async fn claims_by_ids(&self, ids: &[i64]) -> Result<Vec<Claim>, StoreError>;

    /// Up to `limit` claims currently assigned to the given cluster,
    /// ordered by ascending id.
    async fn sample_claims_for_cluster(
        &self,
        cluster_id: i64,
        limit: usize,
    ) -> Result<Vec<Claim>, StoreError>;

    /// Claim count and summed cost per component, ordered by descending
    /// cost.
    async fn cost_by_component(&self) -> Result<Vec<ComponentCost>, StoreError>;
}

/// Read/write access to failure clusters.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Replace the entire cluster partition as one transactional unit.
    ///
    /// Clears every claim's `cluster_id`, deletes all existing clusters,
    /// inserts the new set, and assigns each cluster's members — with no
    /// intermediate state visible to readers. Returns the created cluster
    /// ids in input order.
    async fn replace_all(&self, partition: Vec<NewCluster>) -> Result<Vec<i64>, StoreError>;

    /// All clusters ordered by descending member count.
    async fn clusters_by_size_desc(&self) -> Result<Vec<Cluster>, StoreError>;

    /// Store a batch of explanations in one commit.
    ///
    /// Either every listed cluster gets both explanation fields or none
    /// does; an explanation is never partially written.
    async fn store_explanations(
        &self,
        updates: Vec<(i64, Explanation)>,
    ) -> Result<(), StoreError>;

    /// The `limit` largest non-empty clusters, by member count then total
    /// cost.
    async fn top_failure_clusters(&self, limit: usize) -> Result<Vec<Cluster>, StoreError>;
}
