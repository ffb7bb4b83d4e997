//! Language-model explanations for failure clusters.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use claimsight_providers::ChatModel;
use claimsight_store::{ClaimStore, ClusterStore};
use claimsight_types::{Claim, Cluster, Explanation};

use crate::tally::dedup_preserving_order;
use crate::PipelineError;

const SYSTEM_PROMPT: &str = "You are a helpful automotive quality engineer.";

/// Why a model response could not be turned into an [`Explanation`].
#[derive(Debug, thiserror::Error)]
pub enum ExplanationParseError {
    #[error("response is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("response missing field: {0}")]
    Schema(&'static str),
}

/// Fills in missing root-cause explanations for clusters, largest first.
///
/// Explanations are advisory: a failed or unparseable model response skips
/// that cluster and the loop continues. All successful explanations from one
/// pass are committed as a single batch.
pub struct ClusterExplainer<C, S> {
    chat: Option<Arc<C>>,
    store: Arc<S>,
    max_sample_claims: usize,
}

impl<C, S> ClusterExplainer<C, S>
where
    C: ChatModel,
    S: ClaimStore + ClusterStore,
{
    /// Create an explainer. `chat` is `None` when no API key is configured,
    /// which turns every pass into a logged no-op.
    pub fn new(chat: Option<Arc<C>>, store: Arc<S>, max_sample_claims: usize) -> Self {
        Self {
            chat,
            store,
            max_sample_claims,
        }
    }

    /// Generate explanations for every cluster that lacks one, returning the
    /// number updated.
    ///
    /// Already-explained clusters are never re-sent to the model, so the
    /// operation is idempotent and a retried pass only fills remaining gaps.
    pub async fn explain_clusters(&self) -> Result<usize, PipelineError> {
        let chat = match &self.chat {
            Some(chat) => chat,
            None => {
                warn!("Chat model not configured; skipping AI explanations");
                return Ok(0);
            }
        };

        let clusters = self.store.clusters_by_size_desc().await?;
        let mut updates = Vec::new();

        for cluster in clusters {
            if cluster.num_claims == 0 || cluster.is_explained() {
                continue;
            }

            let samples = self
                .store
                .sample_claims_for_cluster(cluster.id, self.max_sample_claims)
                .await?;
            if samples.is_empty() {
                continue;
            }

            let prompt = build_prompt(&cluster, &samples);
            let response = match chat.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(cluster_id = cluster.id, error = %e, "Explanation request failed");
                    continue;
                }
            };

            match parse_explanation(&response) {
                Ok(explanation) => updates.push((cluster.id, explanation)),
                Err(e) => {
                    warn!(cluster_id = cluster.id, error = %e, "Unusable explanation response");
                    debug!(cluster_id = cluster.id, raw = %response, "Raw model output");
                }
            }
        }

        let updated = updates.len();
        if updated > 0 {
            self.store.store_explanations(updates).await?;
        }
        info!(updated, "Explanation pass complete");
        Ok(updated)
    }
}

/// Assemble the user prompt for one cluster from its aggregates and a sample
/// of member claims.
fn build_prompt(cluster: &Cluster, samples: &[Claim]) -> String {
    let models: BTreeSet<&str> = samples
        .iter()
        .filter(|c| !c.model.is_empty())
        .map(|c| c.model.as_str())
        .collect();
    let regions: BTreeSet<&str> = samples
        .iter()
        .filter_map(|c| c.region.as_deref())
        .filter(|r| !r.is_empty())
        .collect();

    let dtcs = dedup_preserving_order(samples.iter().flat_map(|c| c.dtc_code_list()));
    let components = dedup_preserving_order(
        samples
            .iter()
            .filter(|c| !c.component.is_empty())
            .map(|c| c.component.clone()),
    );

    let models = join_or(&models, "Unknown");
    let regions = join_or(&regions, "Unknown");
    let dtc_line = cluster
        .sample_dtc_codes
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| nonempty_join(&dtcs, "None"));
    let component_line = cluster
        .sample_components
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| nonempty_join(&components, "None"));

    let symptom_lines = samples
        .iter()
        .filter(|c| !c.symptom_text.is_empty())
        .map(|c| format!("  * \"{}\"", c.symptom_text))
        .collect::<Vec<_>>()
        .join("\n");
    let symptom_lines = if symptom_lines.is_empty() {
        "  * No sample texts available".to_string()
    } else {
        symptom_lines
    };

    format!(
        "You are an automotive quality engineer. You receive warranty claim data for a single failure cluster.\n\
         Based on the patterns, you must:\n\
         \n\
         1. Describe the likely root cause in one or two sentences.\n\
         2. Suggest 2-3 recommended next actions for engineering, supplier quality, or service teams.\n\
         \n\
         Here is the cluster data:\n\
         \n\
         * Number of claims: {}\n\
         * Total cost: {}\n\
         * Models: {}\n\
         * Regions: {}\n\
         * Sample DTC codes: {}\n\
         * Sample components: {}\n\
         * Sample claim texts:\n\
         {}\n\
         \n\
         Respond in valid JSON with the following structure:\n\
         {{\n  \"root_cause_hypothesis\": \"...\",\n  \"recommended_actions\": [\"...\", \"...\"]\n}}",
        cluster.num_claims,
        cluster.total_cost_usd,
        models,
        regions,
        dtc_line,
        component_line,
        symptom_lines,
    )
}

fn join_or(items: &BTreeSet<&str>, fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.iter().copied().collect::<Vec<_>>().join(", ")
    }
}

fn nonempty_join(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

#[derive(Deserialize)]
struct RawExplanation {
    root_cause_hypothesis: Option<String>,
    recommended_actions: Option<Actions>,
}

/// Models sometimes return the action list as a single string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Actions {
    One(String),
    Many(Vec<String>),
}

/// Parse a model response into a validated explanation.
///
/// Tolerates markdown code fences and surrounding prose around the JSON
/// object, but requires both fields to be present.
pub fn parse_explanation(response: &str) -> Result<Explanation, ExplanationParseError> {
    let json_str = extract_json(response);
    let raw: RawExplanation = serde_json::from_str(&json_str)?;

    let root_cause_hypothesis = raw
        .root_cause_hypothesis
        .filter(|s| !s.trim().is_empty())
        .ok_or(ExplanationParseError::Schema("root_cause_hypothesis"))?;

    let recommended_actions = match raw.recommended_actions {
        Some(Actions::One(action)) if !action.trim().is_empty() => action,
        Some(Actions::Many(actions)) if !actions.is_empty() => actions.join("\n"),
        _ => return Err(ExplanationParseError::Schema("recommended_actions")),
    };

    Ok(Explanation {
        root_cause_hypothesis,
        recommended_actions,
    })
}

/// Extract a JSON object from text (handles markdown code blocks).
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            return text[start + 3..start + 3 + end].trim().to_string();
        }
    }

    // A '}' can precede the first '{' in free-form prose; only slice when
    // the braces actually bracket something.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start <= end {
            return text[start..=end].to_string();
        }
    }

    text.to_string()
}
