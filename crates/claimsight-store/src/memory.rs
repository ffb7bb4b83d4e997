//! In-memory store used by tests and local runs.
//!
//! Mirrors the transactional behavior the relational store provides in
//! production: every mutating trait method takes the lock once and applies
//! its whole batch before releasing it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use claimsight_types::{Claim, Cluster, Explanation, NewCluster};

use crate::error::StoreError;
use crate::store::{ClaimStore, ClusterStore, ComponentCost};

#[derive(Default)]
struct Inner {
    claims: BTreeMap<i64, Claim>,
    clusters: BTreeMap<i64, Cluster>,
    next_cluster_id: i64,
}

/// Shared in-memory claim and cluster store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with claims.
    pub fn with_claims(claims: Vec<Claim>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.try_lock().expect("fresh store is uncontended");
            for claim in claims {
                inner.claims.insert(claim.id, claim);
            }
            inner.next_cluster_id = 1;
        }
        store
    }

    /// Fetch a single claim by id (test convenience).
    pub async fn claim(&self, id: i64) -> Option<Claim> {
        self.inner.lock().await.claims.get(&id).cloned()
    }

    /// All clusters ordered by id (test convenience).
    pub async fn all_clusters(&self) -> Vec<Cluster> {
        self.inner.lock().await.clusters.values().cloned().collect()
    }
}

#[async_trait]
impl ClaimStore for InMemoryStore {
    async fn unembedded_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let inner = self.inner.lock().await;
        // BTreeMap iteration already yields ascending ids.
        Ok(inner
            .claims
            .values()
            .filter(|c| c.embedded_at.is_none())
            .cloned()
            .collect())
    }

    async fn mark_embedded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for id in ids {
            let claim = inner
                .claims
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("claim {id}")))?;
            claim.embedded_at = Some(at);
        }
        debug!(count = ids.len(), "Marked claims embedded");
        Ok(())
    }

    async fn claims_by_ids(&self, ids: &[i64]) -> Result<Vec<Claim>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.claims.get(id).cloned())
            .collect())
    }

    async fn sample_claims_for_cluster(
        &self,
        cluster_id: i64,
        limit: usize,
    ) -> Result<Vec<Claim>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claims
            .values()
            .filter(|c| c.cluster_id == Some(cluster_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn cost_by_component(&self) -> Result<Vec<ComponentCost>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rollup: BTreeMap<String, (i64, f64)> = BTreeMap::new();
        for claim in inner.claims.values() {
            let entry = rollup.entry(claim.component.clone()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += claim.claim_cost_usd;
        }

        let mut rows: Vec<ComponentCost> = rollup
            .into_iter()
            .map(|(component, (claim_count, total_cost_usd))| ComponentCost {
                component,
                claim_count,
                total_cost_usd,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_cost_usd
                .partial_cmp(&a.total_cost_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rows)
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn replace_all(&self, partition: Vec<NewCluster>) -> Result<Vec<i64>, StoreError> {
        let mut inner = self.inner.lock().await;

        // Validate every member id before touching anything, so a bad id
        // cannot leave a half-applied partition.
        for new_cluster in &partition {
            for claim_id in &new_cluster.member_claim_ids {
                if !inner.claims.contains_key(claim_id) {
                    return Err(StoreError::NotFound(format!("claim {claim_id}")));
                }
            }
        }

        // Detach every claim and drop the old partition before creating the
        // new set; the lock makes the swap atomic for readers.
        for claim in inner.claims.values_mut() {
            claim.cluster_id = None;
        }
        inner.clusters.clear();

        let mut created = Vec::with_capacity(partition.len());
        for new_cluster in partition {
            let id = inner.next_cluster_id.max(1);
            inner.next_cluster_id = id + 1;

            for claim_id in &new_cluster.member_claim_ids {
                if let Some(claim) = inner.claims.get_mut(claim_id) {
                    claim.cluster_id = Some(id);
                }
            }

            inner.clusters.insert(
                id,
                Cluster {
                    id,
                    label: new_cluster.label,
                    root_cause_hypothesis: None,
                    recommended_actions: None,
                    sample_dtc_codes: new_cluster.sample_dtc_codes,
                    sample_components: new_cluster.sample_components,
                    num_claims: new_cluster.num_claims,
                    total_cost_usd: new_cluster.total_cost_usd,
                    first_failure_date: new_cluster.first_failure_date,
                    last_failure_date: new_cluster.last_failure_date,
                },
            );
            created.push(id);
        }

        debug!(clusters = created.len(), "Replaced cluster partition");
        Ok(created)
    }

    async fn clusters_by_size_desc(&self) -> Result<Vec<Cluster>, StoreError> {
        let inner = self.inner.lock().await;
        let mut clusters: Vec<Cluster> = inner.clusters.values().cloned().collect();
        clusters.sort_by(|a, b| b.num_claims.cmp(&a.num_claims).then(a.id.cmp(&b.id)));
        Ok(clusters)
    }

    async fn store_explanations(
        &self,
        updates: Vec<(i64, Explanation)>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        // Validate the whole batch before touching anything, so a bad id
        // cannot leave a half-applied commit.
        for (id, _) in &updates {
            if !inner.clusters.contains_key(id) {
                return Err(StoreError::NotFound(format!("cluster {id}")));
            }
        }

        let count = updates.len();
        for (id, explanation) in updates {
            if let Some(cluster) = inner.clusters.get_mut(&id) {
                cluster.root_cause_hypothesis = Some(explanation.root_cause_hypothesis);
                cluster.recommended_actions = Some(explanation.recommended_actions);
            }
        }

        debug!(count, "Stored cluster explanations");
        Ok(())
    }

    async fn top_failure_clusters(&self, limit: usize) -> Result<Vec<Cluster>, StoreError> {
        let inner = self.inner.lock().await;
        let mut clusters: Vec<Cluster> = inner
            .clusters
            .values()
            .filter(|c| c.num_claims > 0)
            .cloned()
            .collect();
        clusters.sort_by(|a, b| {
            b.num_claims.cmp(&a.num_claims).then(
                b.total_cost_usd
                    .partial_cmp(&a.total_cost_usd)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        clusters.truncate(limit);
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_claim(id: i64, component: &str, cost: f64) -> Claim {
        Claim {
            id,
            claim_id: format!("WC-{id:04}"),
            vin: format!("VIN{id:014}"),
            model: "Falcon".to_string(),
            model_year: 2023,
            region: Some("NA".to_string()),
            mileage_km: 10_000 * id,
            failure_date: NaiveDate::from_ymd_opt(2024, 1, (id % 27 + 1) as u32),
            component: component.to_string(),
            part_number: "P-1".to_string(),
            dtc_codes: "P0299".to_string(),
            symptom_text: "whine under boost".to_string(),
            repair_action: "replaced part".to_string(),
            claim_cost_usd: cost,
            dealer_id: "D-1".to_string(),
            latitude: None,
            longitude: None,
            cluster_id: None,
            embedded_at: None,
        }
    }

    fn make_new_cluster(label: &str, members: Vec<i64>) -> NewCluster {
        NewCluster {
            label: label.to_string(),
            sample_dtc_codes: None,
            sample_components: None,
            num_claims: members.len() as i64,
            total_cost_usd: 0.0,
            first_failure_date: None,
            last_failure_date: None,
            member_claim_ids: members,
        }
    }

    #[tokio::test]
    async fn unembedded_claims_ascending_and_filtered() {
        let store = InMemoryStore::with_claims(vec![
            make_claim(3, "Turbo", 100.0),
            make_claim(1, "Turbo", 100.0),
            make_claim(2, "Battery", 50.0),
        ]);
        store.mark_embedded(&[2], Utc::now()).await.unwrap();

        let pending = store.unembedded_claims().await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn mark_embedded_uses_shared_timestamp() {
        let store =
            InMemoryStore::with_claims(vec![make_claim(1, "Turbo", 1.0), make_claim(2, "Turbo", 1.0)]);
        let at = Utc::now();
        store.mark_embedded(&[1, 2], at).await.unwrap();

        assert_eq!(store.claim(1).await.unwrap().embedded_at, Some(at));
        assert_eq!(store.claim(2).await.unwrap().embedded_at, Some(at));
    }

    #[tokio::test]
    async fn replace_all_detaches_and_reassigns() {
        let store = InMemoryStore::with_claims(vec![
            make_claim(1, "Turbo", 1.0),
            make_claim(2, "Turbo", 1.0),
            make_claim(3, "Battery", 1.0),
        ]);

        let first = store
            .replace_all(vec![make_new_cluster("old", vec![1, 2, 3])])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = store
            .replace_all(vec![
                make_new_cluster("a", vec![1]),
                make_new_cluster("b", vec![2, 3]),
            ])
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_ne!(second[0], first[0], "cluster ids do not survive recomputes");

        let clusters = store.all_clusters().await;
        assert_eq!(clusters.len(), 2, "old partition is gone");
        assert_eq!(store.claim(1).await.unwrap().cluster_id, Some(second[0]));
        assert_eq!(store.claim(2).await.unwrap().cluster_id, Some(second[1]));
        assert_eq!(store.claim(3).await.unwrap().cluster_id, Some(second[1]));
    }

    #[tokio::test]
    async fn store_explanations_is_all_or_nothing() {
        let store = InMemoryStore::with_claims(vec![make_claim(1, "Turbo", 1.0)]);
        let ids = store
            .replace_all(vec![make_new_cluster("a", vec![1])])
            .await
            .unwrap();

        let explanation = Explanation {
            root_cause_hypothesis: "seal failure".to_string(),
            recommended_actions: "audit supplier".to_string(),
        };

        let result = store
            .store_explanations(vec![(ids[0], explanation.clone()), (999, explanation)])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        // The valid half of the batch must not have been applied.
        let clusters = store.all_clusters().await;
        assert!(clusters[0].root_cause_hypothesis.is_none());
    }

    #[tokio::test]
    async fn top_failure_clusters_orders_by_size_then_cost() {
        let store = InMemoryStore::with_claims(vec![
            make_claim(1, "Turbo", 1.0),
            make_claim(2, "Turbo", 1.0),
            make_claim(3, "Battery", 1.0),
            make_claim(4, "Brakes", 1.0),
        ]);

        let mut big = make_new_cluster("big", vec![1, 2]);
        big.total_cost_usd = 10.0;
        let mut cheap = make_new_cluster("cheap", vec![3]);
        cheap.total_cost_usd = 5.0;
        let mut dear = make_new_cluster("dear", vec![4]);
        dear.total_cost_usd = 50.0;

        store.replace_all(vec![big, cheap, dear]).await.unwrap();

        let top = store.top_failure_clusters(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, "big");
        assert_eq!(top[1].label, "dear");
    }

    #[tokio::test]
    async fn cost_by_component_orders_by_total_cost() {
        let store = InMemoryStore::with_claims(vec![
            make_claim(1, "Turbo", 100.0),
            make_claim(2, "Turbo", 50.0),
            make_claim(3, "Battery", 400.0),
        ]);

        let rows = store.cost_by_component().await.unwrap();
        assert_eq!(rows[0].component, "Battery");
        assert_eq!(rows[0].claim_count, 1);
        assert_eq!(rows[1].component, "Turbo");
        assert_eq!(rows[1].claim_count, 2);
        assert!((rows[1].total_cost_usd - 150.0).abs() < 1e-9);
    }
}
