//! Full recompute of the failure-cluster partition.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use claimsight_store::{ClaimStore, ClusterStore};
use claimsight_types::{Claim, ClusteringSettings, NewCluster};
use claimsight_vector::VectorIndex;

use crate::kmeans::{self, KMeansParams};
use crate::tally::{round_half_up_cents, FrequencyTally};
use crate::PipelineError;

/// How many top DTC codes and components to keep as cluster samples.
const SAMPLE_TOP_K: usize = 5;

/// Claims per cluster used when scaling k with data volume.
const CLAIMS_PER_CLUSTER: usize = 50;

/// Recomputes the entire cluster partition from the vector index.
///
/// Every pass is destructive: the previous clusters are deleted and every
/// claim's assignment cleared before the new set is created, all inside one
/// store transaction. Cluster identity never survives a recompute.
pub struct ClusteringEngine<S, V> {
    store: Arc<S>,
    index: Arc<V>,
    config: ClusteringSettings,
}

impl<S, V> ClusteringEngine<S, V>
where
    S: ClaimStore + ClusterStore,
    V: VectorIndex,
{
    /// Create a clustering engine.
    pub fn new(store: Arc<S>, index: Arc<V>, config: ClusteringSettings) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Cluster count for `n` embedded claims: scales with volume, capped by
    /// the configured default, never below 2.
    fn choose_k(&self, n: usize) -> usize {
        (n / CLAIMS_PER_CLUSTER).min(self.config.default_k).max(2)
    }

    /// Re-partition all embedded claims, returning the number of clusters
    /// created.
    ///
    /// Runs on a point-in-time snapshot of the vector index; claims embedded
    /// concurrently are picked up by the next pass. Returns 0 without side
    /// effects when the index is empty, below the minimum, or unreachable.
    pub async fn recalculate_clusters(&self) -> Result<usize, PipelineError> {
        let embeddings = match self.index.fetch_all().await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                error!(error = %e, "Vector index scan failed; skipping clustering pass");
                return Ok(0);
            }
        };

        if embeddings.is_empty() {
            info!("No embeddings available for clustering");
            return Ok(0);
        }
        if embeddings.len() < self.config.min_claims {
            info!(
                embedded = embeddings.len(),
                min_claims = self.config.min_claims,
                "Insufficient claims for clustering"
            );
            return Ok(0);
        }

        let k = self.choose_k(embeddings.len());
        info!(k, claims = embeddings.len(), "Running k-means clustering");

        let vectors: Vec<Vec<f32>> = embeddings.iter().map(|e| e.vector.clone()).collect();
        let labels = kmeans::cluster(
            &vectors,
            &KMeansParams {
                k,
                seed: self.config.seed,
                restarts: self.config.restarts,
                max_iterations: self.config.max_iterations,
            },
        );

        // Ascending label order keeps cluster creation deterministic for a
        // given partition.
        let mut groups: BTreeMap<usize, Vec<i64>> = BTreeMap::new();
        for (embedding, label) in embeddings.iter().zip(&labels) {
            groups.entry(*label).or_default().push(embedding.id);
        }

        let mut partition = Vec::with_capacity(groups.len());
        let mut members: Vec<Vec<i64>> = Vec::with_capacity(groups.len());
        for (ordinal, (_, claim_ids)) in groups.into_iter().enumerate() {
            let claims = self.store.claims_by_ids(&claim_ids).await?;
            if claims.is_empty() {
                warn!(ordinal, "Cluster group resolved to no claims; skipping");
                continue;
            }
            partition.push(aggregate_cluster(&claims, ordinal));
            members.push(claim_ids);
        }

        let created_ids = self.store.replace_all(partition).await?;
        let created = created_ids.len();

        // Push the fresh assignments into vector payloads. Best-effort: the
        // relational store is the source of truth, and the next pass repairs
        // any drift.
        let mut assignments = BTreeMap::new();
        for (cluster_id, claim_ids) in created_ids.iter().zip(&members) {
            for claim_id in claim_ids {
                assignments.insert(*claim_id, *cluster_id);
            }
        }
        if let Err(e) = self.index.patch_cluster_payload(&assignments).await {
            warn!(error = %e, "Failed to update vector payload cluster ids");
        }

        info!(created, "Clustering pass complete");
        Ok(created)
    }
}

/// Aggregate member claims into the insert form of one cluster.
fn aggregate_cluster(claims: &[Claim], ordinal: usize) -> NewCluster {
    let mut total_cost = 0.0f64;
    let mut first_date: Option<NaiveDate> = None;
    let mut last_date: Option<NaiveDate> = None;
    let mut dtc_tally = FrequencyTally::new();
    let mut component_tally = FrequencyTally::new();

    for claim in claims {
        total_cost += claim.claim_cost_usd;
        if let Some(date) = claim.failure_date {
            first_date = Some(first_date.map_or(date, |d| d.min(date)));
            last_date = Some(last_date.map_or(date, |d| d.max(date)));
        }
        for code in claim.dtc_code_list() {
            dtc_tally.add(&code);
        }
        if !claim.component.is_empty() {
            component_tally.add(&claim.component);
        }
    }

    NewCluster {
        label: compute_label(&component_tally, &dtc_tally, ordinal),
        sample_dtc_codes: join_top(&dtc_tally),
        sample_components: join_top(&component_tally),
        num_claims: claims.len() as i64,
        total_cost_usd: round_half_up_cents(total_cost),
        first_failure_date: first_date,
        last_failure_date: last_date,
        member_claim_ids: claims.iter().map(|c| c.id).collect(),
    }
}

/// "{most common component} / {most common DTC}", with a positional
/// fallback when both tallies are empty.
fn compute_label(components: &FrequencyTally, dtcs: &FrequencyTally, ordinal: usize) -> String {
    let mut parts = Vec::new();
    if let Some(component) = components.most_common() {
        parts.push(component.to_string());
    }
    if let Some(dtc) = dtcs.most_common() {
        parts.push(dtc.to_string());
    }
    if parts.is_empty() {
        return format!("Cluster {}", ordinal + 1);
    }
    parts.join(" / ")
}

fn join_top(tally: &FrequencyTally) -> Option<String> {
    if tally.is_empty() {
        return None;
    }
    Some(tally.top(SAMPLE_TOP_K).join(", "))
}
