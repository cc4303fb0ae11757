//! Integration tests for the cache-aware analysis flows.

mod common;

use common::TestStore;
use common::fixtures::*;
use fairway_core::{AnalysisContext, CacheOutcome};
use fairway_store::pipeline::{ingest_dataset, record_clustering, record_graph};
use fairway_store::StoreError;

#[tokio::test]
async fn test_ingest_computes_once_per_parameter_set() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let params = ingestion_params("shared-source");

    let first = ingest_dataset(store.as_ref(), "first", alice.user_id, &params, || {
        sample_positions(5)
    })
    .await
    .unwrap();
    assert_eq!(first.outcome, CacheOutcome::Miss);

    // Same source and settings: the normalize closure must not run again.
    let second = ingest_dataset(store.as_ref(), "second", alice.user_id, &params, || {
        panic!("normalization ran on a cache hit")
    })
    .await
    .unwrap();
    assert_eq!(second.outcome, CacheOutcome::Hit);
    assert_eq!(
        second.fingerprint.fingerprint_id,
        first.fingerprint.fingerprint_id
    );
    assert_ne!(second.dataset.dataset_id, first.dataset.dataset_id);

    assert_eq!(
        store
            .count_positions(first.fingerprint.fingerprint_id)
            .await
            .unwrap(),
        5
    );
}

#[tokio::test]
async fn test_clustering_rerun_hits_and_keeps_one_link() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let ingestion = ingest_dataset(store.as_ref(), "oresund", alice.user_id, &ingestion_params("seed-a"), || {
        sample_positions(6)
    })
    .await
    .unwrap();
    let position_ids = store
        .get_positions(ingestion.fingerprint.fingerprint_id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.position_id)
        .collect::<Vec<_>>();

    let mut ctx = AnalysisContext::new();
    let params = clustering_params(ingestion.dataset.dataset_id, 0.5, 5);

    // Two clusters over five of the six points; the sixth is noise.
    let first = record_clustering(store.as_ref(), &mut ctx, &params, || {
        vec![
            sample_cluster(0, position_ids[..3].to_vec()),
            sample_cluster(1, position_ids[3..5].to_vec()),
        ]
    })
    .await
    .unwrap();
    assert_eq!(first.outcome, CacheOutcome::Miss);
    assert_eq!(ctx.current(), Some(&first.pointer));

    let clusters = store
        .get_clusters(first.fingerprint.fingerprint_id)
        .await
        .unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(
        store
            .get_cluster_members(first.fingerprint.fingerprint_id, 0)
            .await
            .unwrap()
            .len(),
        3
    );

    // Identical eps/minPts: hit, closure untouched, still exactly one link.
    let second = record_clustering(store.as_ref(), &mut ctx, &params, || {
        panic!("clustering ran on a cache hit")
    })
    .await
    .unwrap();
    assert_eq!(second.outcome, CacheOutcome::Hit);
    assert_eq!(
        store
            .count_links(first.fingerprint.fingerprint_id)
            .await
            .unwrap(),
        1
    );

    // A different eps is a different analysis.
    let other = clustering_params(ingestion.dataset.dataset_id, 0.9, 5);
    let third = record_clustering(store.as_ref(), &mut ctx, &other, || {
        vec![sample_cluster(0, position_ids.clone())]
    })
    .await
    .unwrap();
    assert_eq!(third.outcome, CacheOutcome::Miss);
    assert_ne!(
        third.fingerprint.fingerprint_id,
        first.fingerprint.fingerprint_id
    );
    // The context now points at the latest run.
    assert_eq!(ctx.current(), Some(&third.pointer));
}

#[tokio::test]
async fn test_ingest_retries_after_aborted_run() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let params = ingestion_params("aborted-seed");

    // A run that resolved the fingerprint and then died before recording
    // any positions leaves a pending row behind.
    let (leftover, outcome) = store.resolve(&params.to_param_set()).await.unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);

    // The retry must not treat the empty pending row as a usable hit.
    let retry = ingest_dataset(store.as_ref(), "oresund", alice.user_id, &params, || {
        sample_positions(3)
    })
    .await
    .unwrap();
    assert_eq!(retry.outcome, CacheOutcome::Miss);
    assert_eq!(retry.fingerprint.fingerprint_id, leftover.fingerprint_id);
    assert_eq!(
        store
            .count_positions(leftover.fingerprint_id)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_clustering_retries_after_aborted_run() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let ingestion = ingest_dataset(store.as_ref(), "oresund", alice.user_id, &ingestion_params("seed-a"), || {
        sample_positions(4)
    })
    .await
    .unwrap();
    let position_ids = store
        .get_positions(ingestion.fingerprint.fingerprint_id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.position_id)
        .collect::<Vec<_>>();

    let params = clustering_params(ingestion.dataset.dataset_id, 0.5, 5);

    // Pending leftover from a run that never stored its clusters.
    let (leftover, _) = store.resolve(&params.to_param_set()).await.unwrap();

    let mut ctx = AnalysisContext::new();
    let retry = record_clustering(store.as_ref(), &mut ctx, &params, || {
        vec![sample_cluster(0, position_ids.clone())]
    })
    .await
    .unwrap();
    assert_eq!(retry.outcome, CacheOutcome::Miss);
    assert_eq!(retry.fingerprint.fingerprint_id, leftover.fingerprint_id);
    assert_eq!(
        store
            .get_clusters(leftover.fingerprint_id)
            .await
            .unwrap()
            .len(),
        1
    );

    // Once the retry has stored its artifacts the next run is a real hit.
    let second = record_clustering(store.as_ref(), &mut ctx, &params, || {
        panic!("clustering ran on a cache hit")
    })
    .await
    .unwrap();
    assert_eq!(second.outcome, CacheOutcome::Hit);
}

#[tokio::test]
async fn test_graph_flow_reuses_stored_graph() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let ingestion = ingest_dataset(store.as_ref(), "oresund", alice.user_id, &ingestion_params("seed-a"), || {
        sample_positions(4)
    })
    .await
    .unwrap();
    let position_ids = store
        .get_positions(ingestion.fingerprint.fingerprint_id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.position_id)
        .collect::<Vec<_>>();

    let mut ctx = AnalysisContext::new();
    let clustering = record_clustering(
        store.as_ref(),
        &mut ctx,
        &clustering_params(ingestion.dataset.dataset_id, 0.5, 5),
        || vec![sample_cluster(0, position_ids.clone())],
    )
    .await
    .unwrap();

    let params = graph_params(clustering.pointer, 0);
    let first = record_graph(store.as_ref(), &ctx, &params, small_graph)
        .await
        .unwrap();
    assert_eq!(first.outcome, CacheOutcome::Miss);

    let second = record_graph(store.as_ref(), &ctx, &params, || {
        panic!("graph build ran on a cache hit")
    })
    .await
    .unwrap();
    assert_eq!(second.outcome, CacheOutcome::Hit);
    assert_eq!(second.graph.graph_id, first.graph.graph_id);
}

#[tokio::test]
async fn test_graph_flow_requires_selected_clustering() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let ctx = AnalysisContext::new();
    let digest = fairway_core::ParamsDigest::compute(b"unselected");
    let result = record_graph(store.as_ref(), &ctx, &graph_params(digest, 0), small_graph).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_graph_flow_rejects_stale_parameters() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let alice = create_user(store.as_ref(), "alice").await;
    let ingestion = ingest_dataset(store.as_ref(), "oresund", alice.user_id, &ingestion_params("seed-a"), || {
        sample_positions(4)
    })
    .await
    .unwrap();
    let position_ids = store
        .get_positions(ingestion.fingerprint.fingerprint_id)
        .await
        .unwrap()
        .iter()
        .map(|p| p.position_id)
        .collect::<Vec<_>>();

    let mut ctx = AnalysisContext::new();
    record_clustering(
        store.as_ref(),
        &mut ctx,
        &clustering_params(ingestion.dataset.dataset_id, 0.5, 5),
        || vec![sample_cluster(0, position_ids.clone())],
    )
    .await
    .unwrap();

    // Parameters derived from some other clustering run.
    let stale = fairway_core::ParamsDigest::compute(b"some-other-run");
    let result = record_graph(store.as_ref(), &ctx, &graph_params(stale, 0), small_graph).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}
