//! Warranty claim records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One warranty repair record.
///
/// Claims are owned by the relational store; the maintenance pipeline only
/// reads them and writes back `embedded_at` and `cluster_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Surrogate primary key in the relational store.
    pub id: i64,

    /// External claim identifier (e.g., "WC-2024-001871").
    pub claim_id: String,

    /// Vehicle identification number.
    pub vin: String,

    /// Vehicle model name.
    pub model: String,

    /// Model year.
    pub model_year: i32,

    /// Sales region code, when known.
    pub region: Option<String>,

    /// Odometer reading at failure, in kilometers.
    pub mileage_km: i64,

    /// Date the failure occurred.
    pub failure_date: Option<NaiveDate>,

    /// Failing component name.
    pub component: String,

    /// Part number of the replaced part.
    pub part_number: String,

    /// Comma-delimited diagnostic trouble codes (e.g., "P0301, P0420").
    pub dtc_codes: String,

    /// Free-text symptom description from the repair order.
    pub symptom_text: String,

    /// Free-text description of the repair performed.
    pub repair_action: String,

    /// Claim cost in US dollars.
    pub claim_cost_usd: f64,

    /// Servicing dealer identifier.
    pub dealer_id: String,

    /// Dealer latitude, when geocoded.
    pub latitude: Option<f64>,

    /// Dealer longitude, when geocoded.
    pub longitude: Option<f64>,

    /// Current failure-cluster assignment; cleared on every recompute.
    pub cluster_id: Option<i64>,

    /// When the claim was embedded into the vector index; null until then.
    pub embedded_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Build the sentence sent to the embedding provider.
    ///
    /// The field order is part of the embedding's semantic stability:
    /// changing it invalidates every vector already in the index.
    pub fn embedding_input(&self) -> String {
        format!(
            "Model: {}, Component: {}, Region: {}, DTC: {}, Symptoms: {}",
            self.model,
            self.component,
            self.region.as_deref().unwrap_or(""),
            self.dtc_codes,
            self.symptom_text,
        )
    }

    /// Split `dtc_codes` into trimmed, non-empty individual codes.
    pub fn dtc_code_list(&self) -> Vec<String> {
        self.dtc_codes
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect()
    }
}
