//! In-memory vector index used by tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::VectorIndexError;
use crate::point::{ClaimEmbedding, ScoredPoint, SearchFilter};
use crate::VectorIndex;

/// Vector index holding points in a map, with cosine-similarity search.
///
/// `None` models a collection that has not been created yet, so
/// `fetch_all` on a fresh index returns empty exactly like the Qdrant
/// adapter does.
#[derive(Default)]
pub struct InMemoryIndex {
    collection: Mutex<Option<BTreeMap<i64, ClaimEmbedding>>>,
    fail_patches: AtomicBool,
}

impl InMemoryIndex {
    /// Create an index with no collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `patch_cluster_payload` fail, to script best-effort paths.
    pub fn set_fail_patches(&self, fail: bool) {
        self.fail_patches.store(fail, Ordering::SeqCst);
    }

    /// Fetch a single point by claim id (test convenience).
    pub fn point(&self, id: i64) -> Option<ClaimEmbedding> {
        self.collection
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|points| points.get(&id).cloned())
    }

    /// Number of stored points; zero when the collection is absent.
    pub fn len(&self) -> usize {
        self.collection
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |points| points.len())
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches(filter: &SearchFilter, point: &ClaimEmbedding) -> bool {
    let payload = match serde_json::to_value(&point.payload) {
        Ok(value) => value,
        Err(_) => return false,
    };
    filter
        .must
        .iter()
        .all(|m| payload.get(&m.key) == Some(&m.value))
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self) -> Result<(), VectorIndexError> {
        let mut collection = self.collection.lock().unwrap();
        if collection.is_none() {
            *collection = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn upsert(&self, points: Vec<ClaimEmbedding>) -> Result<(), VectorIndexError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut collection = self.collection.lock().unwrap();
        let map = collection.get_or_insert_with(BTreeMap::new);
        for point in points {
            map.insert(point.id, point);
        }
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<ClaimEmbedding>, VectorIndexError> {
        let collection = self.collection.lock().unwrap();
        Ok(collection
            .as_ref()
            .map(|points| points.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn patch_cluster_payload(
        &self,
        assignments: &BTreeMap<i64, i64>,
    ) -> Result<(), VectorIndexError> {
        if assignments.is_empty() {
            return Ok(());
        }
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(VectorIndexError::Request(
                "simulated payload patch failure".to_string(),
            ));
        }
        let mut collection = self.collection.lock().unwrap();
        if let Some(points) = collection.as_mut() {
            for (claim_id, cluster_id) in assignments {
                if let Some(point) = points.get_mut(claim_id) {
                    point.payload.cluster_id = Some(*cluster_id);
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorIndexError> {
        let collection = self.collection.lock().unwrap();
        let mut hits: Vec<ScoredPoint> = collection
            .as_ref()
            .map(|points| {
                points
                    .values()
                    .filter(|p| filter.as_ref().map_or(true, |f| matches(f, p)))
                    .map(|p| ScoredPoint {
                        id: p.id,
                        score: cosine_similarity(vector, &p.vector),
                        payload: p.payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
