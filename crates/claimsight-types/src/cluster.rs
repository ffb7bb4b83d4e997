//! Failure cluster records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A disposable grouping of claims believed to share a root cause.
///
/// Clusters are fully owned by the clustering engine: every recompute deletes
/// the existing set and creates a fresh one, so cluster ids never persist
/// across recomputes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Surrogate primary key in the relational store.
    pub id: i64,

    /// Human-readable label, "{top component} / {top DTC}".
    pub label: String,

    /// AI-written root-cause hypothesis, if an explanation has been stored.
    pub root_cause_hypothesis: Option<String>,

    /// AI-written recommended actions, newline-joined if the model returned
    /// a list.
    pub recommended_actions: Option<String>,

    /// Top-5 DTC codes by member frequency, comma-joined.
    pub sample_dtc_codes: Option<String>,

    /// Top-5 components by member frequency, comma-joined.
    pub sample_components: Option<String>,

    /// Exact count of claims currently referencing this cluster.
    pub num_claims: i64,

    /// Sum of member claim costs, rounded half-up to cents.
    pub total_cost_usd: f64,

    /// Earliest failure date among members.
    pub first_failure_date: Option<NaiveDate>,

    /// Latest failure date among members.
    pub last_failure_date: Option<NaiveDate>,
}

impl Cluster {
    /// Whether both explanation fields are already populated.
    ///
    /// Explained clusters are never re-sent to the language model.
    pub fn is_explained(&self) -> bool {
        self.root_cause_hypothesis.is_some() && self.recommended_actions.is_some()
    }
}

/// Insert form of a cluster, produced by one clustering pass.
///
/// Carries the member claim ids so the store can apply the cluster row and
/// its assignments as a single transactional unit.
#[derive(Debug, Clone)]
pub struct NewCluster {
    /// Human-readable label.
    pub label: String,

    /// Top-5 DTC codes by member frequency, comma-joined.
    pub sample_dtc_codes: Option<String>,

    /// Top-5 components by member frequency, comma-joined.
    pub sample_components: Option<String>,

    /// Member count at creation time.
    pub num_claims: i64,

    /// Half-up rounded sum of member costs.
    pub total_cost_usd: f64,

    /// Earliest failure date among members.
    pub first_failure_date: Option<NaiveDate>,

    /// Latest failure date among members.
    pub last_failure_date: Option<NaiveDate>,

    /// Claims assigned to this cluster.
    pub member_claim_ids: Vec<i64>,
}

/// A validated language-model explanation for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// One- or two-sentence root-cause hypothesis.
    pub root_cause_hypothesis: String,

    /// Recommended next actions, newline-joined when the model returned a
    /// list.
    pub recommended_actions: String,
}
