//! End-to-end test infrastructure for ClaimSight.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full embed-cluster-explain pipeline.

use std::sync::Arc;

use chrono::NaiveDate;

use claimsight_store::InMemoryStore;
use claimsight_types::{Claim, Settings};
use claimsight_vector::InMemoryIndex;

/// Shared test harness for E2E tests.
///
/// Holds an in-memory claim store and vector index plus default settings
/// tuned for small fixtures.
pub struct TestHarness {
    /// Shared claim and cluster store
    pub store: Arc<InMemoryStore>,
    /// Shared vector index
    pub index: Arc<InMemoryIndex>,
    /// Settings with a fixture-sized clustering threshold
    pub settings: Settings,
}

impl TestHarness {
    /// Create a harness seeded with the given claims.
    pub fn with_claims(claims: Vec<Claim>) -> Self {
        let mut settings = Settings::default();
        settings.embedding.batch_size = 16;
        settings.clustering.min_claims = 10;
        settings.clustering.default_k = 4;
        Self {
            store: Arc::new(InMemoryStore::with_claims(claims)),
            index: Arc::new(InMemoryIndex::new()),
            settings,
        }
    }
}

/// A well-formed model response for explanation tests.
pub const GOOD_EXPLANATION: &str = r#"{
  "root_cause_hypothesis": "Premature wastegate actuator wear under sustained high boost.",
  "recommended_actions": ["Audit actuator supplier lots", "Issue revised boost calibration"]
}"#;

/// Create `count` claims alternating between two distinct failure families,
/// so their embeddings (and any distance-based clustering over them) split
/// cleanly in two.
pub fn create_test_claims(count: usize) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(count);
    for i in 0..count {
        let id = (i + 1) as i64;
        let turbo_family = i % 2 == 0;
        let (component, dtc, symptom) = if turbo_family {
            (
                "Turbocharger",
                "P0299",
                "loss of power with whistling noise under acceleration",
            )
        } else {
            (
                "Fuel Injector",
                "P0201",
                "rough idle and misfire on cylinder one when cold",
            )
        };
        claims.push(Claim {
            id,
            claim_id: format!("WC-2024-{id:05}"),
            vin: format!("1FTSW21P{id:08}"),
            model: if turbo_family { "Falcon" } else { "Osprey" }.to_string(),
            model_year: 2023,
            region: Some(if turbo_family { "NA" } else { "EU" }.to_string()),
            mileage_km: 15_000 + (i as i64) * 137,
            failure_date: NaiveDate::from_ymd_opt(2024, 1 + (i % 12) as u32, 1 + (i % 28) as u32),
            component: component.to_string(),
            part_number: format!("PN-{}", if turbo_family { "T400" } else { "F118" }),
            dtc_codes: dtc.to_string(),
            symptom_text: format!("{symptom} (occurrence {})", i + 1),
            repair_action: "component replaced under warranty".to_string(),
            claim_cost_usd: 850.0 + (i as f64) * 3.25,
            dealer_id: format!("D-{:03}", i % 40),
            latitude: None,
            longitude: None,
            cluster_id: None,
            embedded_at: None,
        });
    }
    claims
}
