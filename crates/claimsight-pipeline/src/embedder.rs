//! Embedding generation over unembedded claims.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use claimsight_providers::EmbeddingProvider;
use claimsight_store::ClaimStore;
use claimsight_vector::{ClaimEmbedding, PointPayload, VectorIndex};

use crate::PipelineError;

/// Embeds every claim with a null `embedded_at` and mirrors the vectors
/// into the vector index.
///
/// Claims are processed in ascending-id order in fixed-size batches. Each
/// batch commits independently: vectors are upserted first, then the whole
/// batch is stamped with one shared `embedded_at` timestamp. The first
/// failing batch aborts the run; earlier batches stay committed and a rerun
/// naturally skips them.
pub struct EmbeddingGenerator<P, S, V> {
    provider: Option<Arc<P>>,
    store: Arc<S>,
    index: Arc<V>,
    batch_size: usize,
}

impl<P, S, V> EmbeddingGenerator<P, S, V>
where
    P: EmbeddingProvider,
    S: ClaimStore,
    V: VectorIndex,
{
    /// Create a generator. `provider` is `None` when no embedding API is
    /// configured, which turns every run into a no-op.
    pub fn new(provider: Option<Arc<P>>, store: Arc<S>, index: Arc<V>, batch_size: usize) -> Self {
        Self {
            provider,
            store,
            index,
            // A zero batch size would loop forever; clamp rather than error.
            batch_size: batch_size.max(1),
        }
    }

    /// Embed all pending claims, returning how many were committed.
    ///
    /// Never fails on provider or index trouble: the run stops at the first
    /// failing batch and reports the work already committed. Store errors
    /// do propagate, since they mean the relational source of truth is
    /// unreachable.
    pub async fn embed_new_claims(&self) -> Result<usize, PipelineError> {
        let Some(provider) = &self.provider else {
            warn!("Embedding provider not configured; skipping embedding generation");
            return Ok(0);
        };

        let claims = self.store.unembedded_claims().await?;
        if claims.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.index.ensure_collection().await {
            error!(error = %e, "Vector collection unavailable; aborting embedding run");
            return Ok(0);
        }

        info!(pending = claims.len(), batch_size = self.batch_size, "Embedding new claims");

        let mut total_embedded = 0;

        for batch in claims.chunks(self.batch_size) {
            let first_id = batch[0].id;
            let inputs: Vec<String> = batch.iter().map(|c| c.embedding_input()).collect();

            let vectors = match provider.embed_batch(&inputs).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    error!(first_claim_id = first_id, error = %e, "Embedding call failed; aborting run");
                    break;
                }
            };

            if vectors.len() != batch.len() {
                error!(
                    first_claim_id = first_id,
                    expected = batch.len(),
                    actual = vectors.len(),
                    "Embedding count mismatch; aborting run"
                );
                break;
            }

            let stamped_at = Utc::now();
            let points: Vec<ClaimEmbedding> = batch
                .iter()
                .zip(vectors)
                .map(|(claim, vector)| ClaimEmbedding {
                    id: claim.id,
                    vector,
                    payload: PointPayload::from_claim(claim),
                })
                .collect();

            if let Err(e) = self.index.upsert(points).await {
                error!(first_claim_id = first_id, error = %e, "Vector upsert failed; aborting run");
                break;
            }

            // Timestamps commit only after the upsert landed; a crash in
            // between re-embeds the batch on the next run, which the upsert
            // replace semantics absorb.
            let ids: Vec<i64> = batch.iter().map(|c| c.id).collect();
            self.store.mark_embedded(&ids, stamped_at).await?;

            total_embedded += batch.len();
        }

        info!(embedded = total_embedded, "Embedding run complete");
        Ok(total_embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimsight_providers::mock::{MockEmbeddingProvider, ShortReplyEmbeddingProvider};
    use claimsight_store::InMemoryStore;
    use claimsight_types::Claim;
    use claimsight_vector::InMemoryIndex;

    fn make_claim(id: i64) -> Claim {
        Claim {
            id,
            claim_id: format!("WC-{id:04}"),
            vin: format!("VIN{id:014}"),
            model: "Falcon".to_string(),
            model_year: 2023,
            region: Some("EU".to_string()),
            mileage_km: 30_000,
            failure_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            component: "Turbocharger".to_string(),
            part_number: "TC-9981".to_string(),
            dtc_codes: "P0299".to_string(),
            symptom_text: format!("claim {id} loses boost"),
            repair_action: "replaced turbo".to_string(),
            claim_cost_usd: 100.0,
            dealer_id: "D-1".to_string(),
            latitude: None,
            longitude: None,
            cluster_id: None,
            embedded_at: None,
        }
    }

    fn generator(
        provider: Option<Arc<MockEmbeddingProvider>>,
        store: Arc<InMemoryStore>,
        index: Arc<InMemoryIndex>,
        batch_size: usize,
    ) -> EmbeddingGenerator<MockEmbeddingProvider, InMemoryStore, InMemoryIndex> {
        EmbeddingGenerator::new(provider, store, index, batch_size)
    }

    #[tokio::test]
    async fn unconfigured_provider_is_a_noop() {
        let store = Arc::new(InMemoryStore::with_claims(vec![make_claim(1)]));
        let index = Arc::new(InMemoryIndex::new());

        let gen = generator(None, store.clone(), index.clone(), 8);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 0);
        assert!(store.claim(1).await.unwrap().embedded_at.is_none());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn embeds_all_pending_claims_and_writes_payloads() {
        let store = Arc::new(InMemoryStore::with_claims(vec![
            make_claim(1),
            make_claim(2),
            make_claim(3),
        ]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new(8));

        let gen = generator(Some(provider), store.clone(), index.clone(), 2);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 3);

        assert_eq!(index.len(), 3);
        let point = index.point(2).unwrap();
        assert_eq!(point.payload.claim_id, "WC-0002");
        assert_eq!(point.payload.failure_date.as_deref(), Some("2024-01-10"));
        assert!(store.claim(3).await.unwrap().embedded_at.is_some());
    }

    #[tokio::test]
    async fn batch_timestamp_is_shared() {
        let store = Arc::new(InMemoryStore::with_claims(vec![make_claim(1), make_claim(2)]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new(4));

        let gen = generator(Some(provider), store.clone(), index, 2);
        gen.embed_new_claims().await.unwrap();

        let first = store.claim(1).await.unwrap().embedded_at.unwrap();
        let second = store.claim(2).await.unwrap().embedded_at.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn second_run_embeds_nothing_new() {
        let store = Arc::new(InMemoryStore::with_claims(vec![make_claim(1), make_claim(2)]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new(4));

        let gen = generator(Some(provider), store, index, 8);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 2);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_failure_keeps_earlier_batches() {
        // Three claims, batch size 2: the first batch succeeds, the second
        // hits a provider outage.
        let store = Arc::new(InMemoryStore::with_claims(vec![
            make_claim(1),
            make_claim(2),
            make_claim(3),
        ]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::failing_after(4, 1));

        let gen = generator(Some(provider.clone()), store.clone(), index.clone(), 2);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 2);

        assert!(store.claim(1).await.unwrap().embedded_at.is_some());
        assert!(store.claim(2).await.unwrap().embedded_at.is_some());
        assert!(store.claim(3).await.unwrap().embedded_at.is_none());
        assert_eq!(index.len(), 2);
        assert_eq!(provider.batch_calls(), 2, "run stops at the failing batch");
    }

    #[tokio::test]
    async fn count_mismatch_aborts_the_run() {
        let store = Arc::new(InMemoryStore::with_claims(vec![make_claim(1), make_claim(2)]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(ShortReplyEmbeddingProvider::new(4));

        let gen: EmbeddingGenerator<_, _, _> =
            EmbeddingGenerator::new(Some(provider), store.clone(), index.clone(), 8);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 0);
        assert!(store.claim(1).await.unwrap().embedded_at.is_none());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let store = Arc::new(InMemoryStore::with_claims(vec![make_claim(1)]));
        let index = Arc::new(InMemoryIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new(4));

        let gen = generator(Some(provider), store, index, 0);
        assert_eq!(gen.embed_new_claims().await.unwrap(), 1);
    }
}
