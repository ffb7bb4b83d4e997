//! End-to-end tests for the full embed-cluster-explain maintenance cycle.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use claimsight_pipeline::{MaintenanceCycle, MaintenanceReport};
use claimsight_providers::mock::{MockChatModel, MockEmbeddingProvider};
use e2e_tests::{create_test_claims, TestHarness, GOOD_EXPLANATION};

#[tokio::test]
async fn full_cycle_embeds_clusters_and_explains() {
    let harness = TestHarness::with_claims(create_test_claims(40));
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let chat = Arc::new(MockChatModel::new(GOOD_EXPLANATION));

    let cycle = MaintenanceCycle::new(
        Some(provider),
        Some(chat),
        harness.store.clone(),
        harness.index.clone(),
        &harness.settings,
    );
    let report = cycle.run().await.unwrap();

    assert_eq!(report.claims_embedded, 40);
    assert_eq!(report.clusters_created, 2);
    assert_eq!(report.clusters_explained, 2);

    // Every claim carries a vector, a timestamp, and an assignment.
    assert_eq!(harness.index.len(), 40);
    for id in 1..=40 {
        let claim = harness.store.claim(id).await.unwrap();
        assert!(claim.embedded_at.is_some(), "claim {id} not stamped");
        assert!(claim.cluster_id.is_some(), "claim {id} unassigned");
    }

    let clusters = harness.store.all_clusters().await;
    assert_eq!(clusters.len(), 2);
    let total_members: i64 = clusters.iter().map(|c| c.num_claims).sum();
    assert_eq!(total_members, 40);
    for cluster in &clusters {
        assert!(cluster.is_explained(), "cluster {} unexplained", cluster.id);
        assert!(cluster.total_cost_usd > 0.0);
    }
}

#[tokio::test]
async fn second_cycle_with_no_new_claims_does_no_work() {
    let harness = TestHarness::with_claims(create_test_claims(40));
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let chat = Arc::new(MockChatModel::new(GOOD_EXPLANATION));

    let cycle = MaintenanceCycle::new(
        Some(provider.clone()),
        Some(chat.clone()),
        harness.store.clone(),
        harness.index.clone(),
        &harness.settings,
    );
    cycle.run().await.unwrap();

    let embed_calls = provider.batch_calls();
    let chat_calls = chat.call_count();

    // Clustering reruns (it is a full recompute by design) but nothing is
    // re-embedded and no explained cluster is re-sent to the model.
    let report = cycle.run().await.unwrap();
    assert_eq!(report.claims_embedded, 0);
    assert_eq!(report.clusters_created, 2);
    assert_eq!(provider.batch_calls(), embed_calls);

    // The recompute produced fresh unexplained clusters, so the explainer
    // fills them in again, once each.
    assert_eq!(report.clusters_explained, 2);
    assert_eq!(chat.call_count(), chat_calls + 2);
}

#[tokio::test]
async fn below_threshold_corpus_embeds_but_never_clusters() {
    let harness = TestHarness::with_claims(create_test_claims(6));
    let provider = Arc::new(MockEmbeddingProvider::new(8));
    let chat = Arc::new(MockChatModel::new(GOOD_EXPLANATION));

    let cycle = MaintenanceCycle::new(
        Some(provider),
        Some(chat.clone()),
        harness.store.clone(),
        harness.index.clone(),
        &harness.settings,
    );
    let report = cycle.run().await.unwrap();

    assert_eq!(
        report,
        MaintenanceReport {
            claims_embedded: 6,
            clusters_created: 0,
            clusters_explained: 0,
        }
    );
    assert_eq!(harness.index.len(), 6);
    assert!(harness.store.all_clusters().await.is_empty());
    assert_eq!(chat.call_count(), 0);
}
