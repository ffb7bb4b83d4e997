//! Qdrant REST adapter for the claim-embedding collection.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use claimsight_types::VectorStoreSettings;

use crate::error::VectorIndexError;
use crate::point::{ClaimEmbedding, PointPayload, ScoredPoint, SearchFilter};
use crate::VectorIndex;

/// Configuration for the Qdrant adapter.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant base URL (e.g., "http://localhost:6333")
    pub url: String,

    /// Optional API key, sent as the `api-key` header
    pub api_key: Option<String>,

    /// Collection name
    pub collection: String,

    /// Vector dimensionality, fixed at collection creation
    pub dimension: usize,

    /// Page size for full scrolls
    pub scroll_page_size: usize,

    /// Request timeout
    pub timeout: Duration,
}

impl QdrantConfig {
    /// Build a config from settings plus the embedding dimensionality.
    pub fn from_settings(settings: &VectorStoreSettings, dimension: usize) -> Self {
        Self {
            url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            collection: settings.collection.clone(),
            dimension,
            scroll_page_size: settings.scroll_page_size,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Vector index backed by a Qdrant collection with cosine distance.
pub struct QdrantIndex {
    client: Client,
    config: QdrantConfig,
}

/// Qdrant wraps every response body in `{"result": ..., "status": ...}`.
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    id: i64,
    vector: Option<Vec<f32>>,
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: i64,
    score: f32,
    payload: Option<PointPayload>,
}

impl QdrantIndex {
    /// Create a new Qdrant adapter.
    pub fn new(config: QdrantConfig) -> Result<Self, VectorIndexError> {
        if config.dimension == 0 {
            return Err(VectorIndexError::Config(
                "vector dimension must be > 0".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VectorIndexError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.url, self.config.collection, suffix
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Whether the collection currently exists.
    async fn collection_exists(&self) -> Result<bool, VectorIndexError> {
        let response = self
            .authed(self.client.get(self.collection_url("")))
            .send()
            .await
            .map_err(|e| VectorIndexError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(VectorIndexError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value, VectorIndexError> {
        let response = self
            .authed(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| VectorIndexError::Request(e.to_string()))?;

        Self::decode(response).await
    }

    async fn put_json(&self, url: &str, body: Value) -> Result<Value, VectorIndexError> {
        let response = self
            .authed(self.client.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| VectorIndexError::Request(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value, VectorIndexError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| VectorIndexError::Response(e.to_string()))
    }

    fn filter_to_json(filter: &SearchFilter) -> Value {
        let conditions: Vec<Value> = filter
            .must
            .iter()
            .map(|m| json!({ "key": m.key, "match": { "value": m.value } }))
            .collect();
        json!({ "must": conditions })
    }
}

/// Fold one scroll page into the running result.
///
/// Returns the cursor to request the next page with, or `None` when the
/// scan is complete (empty page, or a missing/null `next_page_offset`).
fn collect_scroll_page(
    page: ScrollResult,
    out: &mut Vec<ClaimEmbedding>,
) -> Result<Option<Value>, VectorIndexError> {
    if page.points.is_empty() {
        return Ok(None);
    }

    for point in page.points {
        let vector = point.vector.ok_or_else(|| {
            VectorIndexError::Response(format!("point {} missing vector", point.id))
        })?;
        let payload = point.payload.ok_or_else(|| {
            VectorIndexError::Response(format!("point {} missing payload", point.id))
        })?;
        out.push(ClaimEmbedding {
            id: point.id,
            vector,
            payload,
        });
    }

    match page.next_page_offset {
        Some(cursor) if !cursor.is_null() => Ok(Some(cursor)),
        _ => Ok(None),
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self) -> Result<(), VectorIndexError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        info!(collection = %self.config.collection, "Creating vector collection");
        let body = json!({
            "vectors": {
                "size": self.config.dimension,
                "distance": "Cosine",
            }
        });

        match self.put_json(&self.collection_url(""), body).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Another writer may have created it between the existence
                // check and the create call.
                if self.collection_exists().await.unwrap_or(false) {
                    warn!(
                        collection = %self.config.collection,
                        error = %e,
                        "Create failed but collection exists; treating as created"
                    );
                    return Ok(());
                }
                Err(e)
            }
        }
    }

    async fn upsert(&self, points: Vec<ClaimEmbedding>) -> Result<(), VectorIndexError> {
        if points.is_empty() {
            return Ok(());
        }

        self.ensure_collection().await?;

        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({
                    "id": p.id,
                    "vector": p.vector,
                    "payload": p.payload,
                }))
                .collect::<Vec<Value>>(),
        });

        debug!(count = points.len(), "Upserting points");
        self.put_json(&self.collection_url("/points?wait=true"), body)
            .await?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<ClaimEmbedding>, VectorIndexError> {
        if !self.collection_exists().await? {
            info!(collection = %self.config.collection, "Collection not initialised yet");
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": self.config.scroll_page_size,
                "with_payload": true,
                "with_vector": true,
            });
            if let Some(cursor) = &offset {
                body["offset"] = cursor.clone();
            }

            let raw = self
                .post_json(&self.collection_url("/points/scroll"), body)
                .await?;
            let page: Envelope<ScrollResult> = serde_json::from_value(raw)
                .map_err(|e| VectorIndexError::Response(e.to_string()))?;

            match collect_scroll_page(page.result, &mut result)? {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
        }

        debug!(count = result.len(), "Fetched all points");
        Ok(result)
    }

    async fn patch_cluster_payload(
        &self,
        assignments: &BTreeMap<i64, i64>,
    ) -> Result<(), VectorIndexError> {
        if assignments.is_empty() {
            return Ok(());
        }

        for (claim_id, cluster_id) in assignments {
            let body = json!({
                "payload": { "cluster_id": cluster_id },
                "points": [claim_id],
            });
            self.post_json(&self.collection_url("/points/payload?wait=true"), body)
                .await?;
        }

        debug!(count = assignments.len(), "Patched cluster payloads");
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorIndexError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = &filter {
            body["filter"] = Self::filter_to_json(filter);
        }

        let raw = self
            .post_json(&self.collection_url("/points/search"), body)
            .await?;
        let hits: Envelope<Vec<SearchHit>> =
            serde_json::from_value(raw).map_err(|e| VectorIndexError::Response(e.to_string()))?;

        hits.result
            .into_iter()
            .map(|hit| {
                let payload = hit.payload.ok_or_else(|| {
                    VectorIndexError::Response(format!("hit {} missing payload", hit.id))
                })?;
                Ok(ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings_strips_trailing_slash() {
        let mut settings = VectorStoreSettings::default();
        settings.url = "http://qdrant:6333/".to_string();
        let config = QdrantConfig::from_settings(&settings, 1536);
        assert_eq!(config.url, "http://qdrant:6333");
        assert_eq!(config.collection, "claim_embeddings");
        assert_eq!(config.dimension, 1536);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let settings = VectorStoreSettings::default();
        let config = QdrantConfig::from_settings(&settings, 0);
        assert!(QdrantIndex::new(config).is_err());
    }

    #[test]
    fn filter_serializes_to_qdrant_shape() {
        let filter = SearchFilter::matching("model", "Falcon").and("model_year", 2023);
        let value = QdrantIndex::filter_to_json(&filter);
        assert_eq!(value["must"][0]["key"], "model");
        assert_eq!(value["must"][0]["match"]["value"], "Falcon");
        assert_eq!(value["must"][1]["match"]["value"], 2023);
    }

    fn make_scroll_point(id: i64) -> ScrollPoint {
        ScrollPoint {
            id,
            vector: Some(vec![id as f32, 0.0]),
            payload: Some(PointPayload {
                claim_id: format!("WC-{id:04}"),
                model: "Falcon".to_string(),
                model_year: 2023,
                region: None,
                component: "Turbo".to_string(),
                part_number: "T-1".to_string(),
                dtc_codes: "P0299".to_string(),
                symptom_text: "whine".to_string(),
                claim_cost_usd: 10.0,
                failure_date: None,
                cluster_id: None,
            }),
        }
    }

    #[test]
    fn scroll_pages_assemble_in_order_until_null_cursor() {
        let mut out = Vec::new();

        let first = ScrollResult {
            points: vec![make_scroll_point(1), make_scroll_point(2)],
            next_page_offset: Some(serde_json::json!(3)),
        };
        let cursor = collect_scroll_page(first, &mut out).unwrap();
        assert_eq!(cursor, Some(serde_json::json!(3)));

        let last = ScrollResult {
            points: vec![make_scroll_point(3)],
            next_page_offset: Some(Value::Null),
        };
        let cursor = collect_scroll_page(last, &mut out).unwrap();
        assert_eq!(cursor, None);

        let ids: Vec<i64> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn empty_scroll_page_terminates_even_with_a_cursor() {
        let mut out = Vec::new();
        let page = ScrollResult {
            points: Vec::new(),
            next_page_offset: Some(serde_json::json!("opaque")),
        };
        assert_eq!(collect_scroll_page(page, &mut out).unwrap(), None);
        assert!(out.is_empty());
    }

    #[test]
    fn scroll_point_without_vector_is_an_error() {
        let mut out = Vec::new();
        let mut point = make_scroll_point(7);
        point.vector = None;
        let page = ScrollResult {
            points: vec![point],
            next_page_offset: None,
        };
        let err = collect_scroll_page(page, &mut out).unwrap_err();
        assert!(matches!(err, VectorIndexError::Response(_)));
    }

    #[test]
    fn scroll_result_decodes_cursor_styles() {
        let raw = serde_json::json!({
            "result": {
                "points": [
                    { "id": 3, "vector": [0.1, 0.2], "payload": {
                        "claim_id": "WC-3", "model": "Falcon", "model_year": 2023,
                        "region": null, "component": "Turbo", "part_number": "T-1",
                        "dtc_codes": "P0299", "symptom_text": "whine",
                        "claim_cost_usd": 10.0, "failure_date": null, "cluster_id": null
                    } }
                ],
                "next_page_offset": null
            },
            "status": "ok"
        });
        let page: Envelope<ScrollResult> = serde_json::from_value(raw).unwrap();
        assert_eq!(page.result.points.len(), 1);
        assert!(page.result.next_page_offset.is_none() || page.result.next_page_offset.unwrap().is_null());
    }
}
