//! # claimsight-pipeline
//!
//! Maintenance pipeline for the ClaimSight semantic index.
//!
//! Three stages keep the derived layers in sync with the claim store:
//! 1. [`EmbeddingGenerator`]: embed claims that have no vector yet and
//!    mirror them into the vector index.
//! 2. [`ClusteringEngine`]: recompute the full failure-cluster partition
//!    from the indexed vectors.
//! 3. [`ClusterExplainer`]: fill in language-model explanations for
//!    clusters that lack one.
//!
//! [`MaintenanceCycle`] runs the stages in that order. Each stage degrades
//! to a no-op when its remote dependency is unconfigured or unreachable;
//! only claim-store failures abort a cycle, since they mean the source of
//! truth itself is down. Cycles are not safe to run concurrently against
//! the same store and must be serialized by the caller.

pub mod clustering;
pub mod embedder;
pub mod explainer;
pub mod kmeans;
pub mod tally;

pub use clustering::ClusteringEngine;
pub use embedder::EmbeddingGenerator;
pub use explainer::ClusterExplainer;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use claimsight_providers::{ChatModel, EmbeddingProvider};
use claimsight_store::{ClaimStore, ClusterStore, StoreError};
use claimsight_types::Settings;
use claimsight_vector::VectorIndex;

/// Install a global `tracing` subscriber honoring `RUST_LOG`, falling back
/// to the configured log level.
///
/// Call once at startup from whatever embeds the pipeline. Fails if a
/// subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

/// Error type for pipeline operations.
///
/// Provider and vector-index failures never surface here; the stages log
/// them and return partial counts instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Counts of work done by one maintenance cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Claims newly embedded and mirrored into the vector index.
    pub claims_embedded: usize,
    /// Clusters created by the recompute, 0 when the pass was skipped.
    pub clusters_created: usize,
    /// Clusters that received a new explanation.
    pub clusters_explained: usize,
}

/// Runs the three pipeline stages back to back.
pub struct MaintenanceCycle<P, C, S, V> {
    embedder: EmbeddingGenerator<P, S, V>,
    clustering: ClusteringEngine<S, V>,
    explainer: ClusterExplainer<C, S>,
}

impl<P, C, S, V> MaintenanceCycle<P, C, S, V>
where
    P: EmbeddingProvider,
    C: ChatModel,
    S: ClaimStore + ClusterStore,
    V: VectorIndex,
{
    /// Assemble a cycle from its adapters and settings. Either provider may
    /// be `None`; the corresponding stage then logs and skips.
    pub fn new(
        embedding_provider: Option<Arc<P>>,
        chat_model: Option<Arc<C>>,
        store: Arc<S>,
        index: Arc<V>,
        settings: &Settings,
    ) -> Self {
        Self {
            embedder: EmbeddingGenerator::new(
                embedding_provider,
                store.clone(),
                index.clone(),
                settings.embedding.batch_size,
            ),
            clustering: ClusteringEngine::new(
                store.clone(),
                index,
                settings.clustering.clone(),
            ),
            explainer: ClusterExplainer::new(
                chat_model,
                store,
                settings.chat.max_sample_claims,
            ),
        }
    }

    /// Run embed, recluster, explain in order and report the counts.
    ///
    /// Later stages still run when an earlier one did nothing, so a cycle
    /// with no new claims can still backfill missing explanations.
    pub async fn run(&self) -> Result<MaintenanceReport, PipelineError> {
        info!("Starting maintenance cycle");

        let claims_embedded = self.embedder.embed_new_claims().await?;
        let clusters_created = self.clustering.recalculate_clusters().await?;
        let clusters_explained = self.explainer.explain_clusters().await?;

        let report = MaintenanceReport {
            claims_embedded,
            clusters_created,
            clusters_explained,
        };
        info!(
            claims_embedded = report.claims_embedded,
            clusters_created = report.clusters_created,
            clusters_explained = report.clusters_explained,
            "Maintenance cycle complete"
        );
        Ok(report)
    }
}
