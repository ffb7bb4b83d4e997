//! Point, payload, and filter types for the vector index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use claimsight_types::Claim;

/// Denormalized claim attributes attached to a vector point.
///
/// The payload lets the index answer filter and display queries without a
/// join back to the relational store. `cluster_id` mirrors the claim's
/// latest assignment eventually, not transactionally; the relational store
/// stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub claim_id: String,
    pub model: String,
    pub model_year: i32,
    pub region: Option<String>,
    pub component: String,
    pub part_number: String,
    pub dtc_codes: String,
    pub symptom_text: String,
    pub claim_cost_usd: f64,
    /// ISO-8601 date string, or null when the failure date is unknown.
    pub failure_date: Option<String>,
    pub cluster_id: Option<i64>,
}

impl PointPayload {
    /// Snapshot a claim's searchable attributes.
    pub fn from_claim(claim: &Claim) -> Self {
        Self {
            claim_id: claim.claim_id.clone(),
            model: claim.model.clone(),
            model_year: claim.model_year,
            region: claim.region.clone(),
            component: claim.component.clone(),
            part_number: claim.part_number.clone(),
            dtc_codes: claim.dtc_codes.clone(),
            symptom_text: claim.symptom_text.clone(),
            claim_cost_usd: claim.claim_cost_usd,
            failure_date: claim.failure_date.map(|d| d.to_string()),
            cluster_id: claim.cluster_id,
        }
    }
}

/// One point in the claim-embedding collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEmbedding {
    /// Relational claim id, reused as the point id.
    pub id: i64,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Denormalized claim snapshot.
    pub payload: PointPayload,
}

/// A ranked similarity-search hit.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: i64,
    pub score: f32,
    pub payload: PointPayload,
}

/// Exact-match condition on one payload field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatch {
    /// Payload key (e.g., "model", "region").
    pub key: String,
    /// Value the field must equal.
    pub value: Value,
}

/// Structured payload filter: every condition must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub must: Vec<FieldMatch>,
}

impl SearchFilter {
    /// Filter requiring `key == value`.
    pub fn matching(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            must: vec![FieldMatch {
                key: key.into(),
                value: value.into(),
            }],
        }
    }

    /// Add another required condition.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(FieldMatch {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn payload_snapshot_carries_iso_date_and_assignment() {
        let claim = Claim {
            id: 9,
            claim_id: "WC-0009".to_string(),
            vin: "VIN9".to_string(),
            model: "Falcon".to_string(),
            model_year: 2022,
            region: Some("APAC".to_string()),
            mileage_km: 12_000,
            failure_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            component: "Battery".to_string(),
            part_number: "B-7".to_string(),
            dtc_codes: "P0562".to_string(),
            symptom_text: "no crank".to_string(),
            repair_action: "replaced battery".to_string(),
            claim_cost_usd: 412.09,
            dealer_id: "D-3".to_string(),
            latitude: Some(35.6),
            longitude: Some(139.7),
            cluster_id: Some(4),
            embedded_at: None,
        };

        let payload = PointPayload::from_claim(&claim);
        assert_eq!(payload.failure_date.as_deref(), Some("2024-02-29"));
        assert_eq!(payload.cluster_id, Some(4));
        assert_eq!(payload.claim_id, "WC-0009");
    }

    #[test]
    fn filter_builder_accumulates_conditions() {
        let filter = SearchFilter::matching("model", "Falcon").and("region", "EU");
        assert_eq!(filter.must.len(), 2);
        assert_eq!(filter.must[1].key, "region");
    }
}
