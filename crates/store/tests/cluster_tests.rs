//! Integration tests for cluster artifact storage.

mod common;

use common::TestStore;
use common::fixtures::*;
use fairway_core::FingerprintState;
use fairway_store::StoreError;
use fairway_store::models::ClusterArtifact;

#[tokio::test]
async fn test_store_and_read_cluster_artifacts() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let user = create_user(store.as_ref(), "alice").await;
    let (dataset, position_ids) =
        create_dataset_with_positions(store.as_ref(), &user, "oresund", "seed-a", 6).await;

    let params = clustering_params(dataset.dataset_id, 0.5, 5);
    let (fingerprint, _) = store.resolve(&params.to_param_set()).await.unwrap();

    let artifacts = vec![
        ClusterArtifact {
            cluster_num: 0,
            member_position_ids: position_ids[..3].to_vec(),
            average_speed: Some(9.5),
            average_course: Some(88.0),
            polygon: vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
        },
        ClusterArtifact {
            cluster_num: 1,
            member_position_ids: position_ids[3..].to_vec(),
            average_speed: Some(12.0),
            average_course: None,
            polygon: vec![],
        },
    ];
    store
        .store_clusters(fingerprint.fingerprint_id, &artifacts)
        .await
        .unwrap();

    // The write flipped the fingerprint to ready.
    let row = store
        .get_fingerprint(fingerprint.fingerprint_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state, FingerprintState::Ready.as_str());

    let clusters = store.get_clusters(fingerprint.fingerprint_id).await.unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].cluster_num, 0);
    assert_eq!(clusters[1].cluster_num, 1);

    let mut members = store
        .get_cluster_members(fingerprint.fingerprint_id, 0)
        .await
        .unwrap();
    members.sort();
    let mut expected = position_ids[..3].to_vec();
    expected.sort();
    assert_eq!(members, expected);

    let stats = store
        .get_cluster_stats(fingerprint.fingerprint_id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.average_speed, Some(12.0));
    assert_eq!(stats.average_course, None);

    assert!(
        store
            .get_cluster_stats(fingerprint.fingerprint_id, 7)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_polygon_points_keep_order() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let user = create_user(store.as_ref(), "alice").await;
    let (dataset, position_ids) =
        create_dataset_with_positions(store.as_ref(), &user, "oresund", "seed-a", 3).await;

    let params = clustering_params(dataset.dataset_id, 0.5, 5);
    let (fingerprint, _) = store.resolve(&params.to_param_set()).await.unwrap();

    let polygon = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)];
    store
        .store_clusters(
            fingerprint.fingerprint_id,
            &[ClusterArtifact {
                cluster_num: 0,
                member_position_ids: position_ids,
                average_speed: None,
                average_course: None,
                polygon: polygon.clone(),
            }],
        )
        .await
        .unwrap();

    let points = store
        .get_cluster_polygon(fingerprint.fingerprint_id, 0)
        .await
        .unwrap();
    let read: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(read, polygon);
    assert_eq!(points[2].point_index, 2);
}

#[tokio::test]
async fn test_store_clusters_twice_conflicts() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let user = create_user(store.as_ref(), "alice").await;
    let (dataset, position_ids) =
        create_dataset_with_positions(store.as_ref(), &user, "oresund", "seed-a", 3).await;

    let params = clustering_params(dataset.dataset_id, 0.5, 5);
    let (fingerprint, _) = store.resolve(&params.to_param_set()).await.unwrap();

    store
        .store_clusters(
            fingerprint.fingerprint_id,
            &[sample_cluster(0, position_ids.clone())],
        )
        .await
        .unwrap();

    // Artifacts are write-once; a second producer must not clobber them.
    let result = store
        .store_clusters(fingerprint.fingerprint_id, &[sample_cluster(1, position_ids)])
        .await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));

    let clusters = store.get_clusters(fingerprint.fingerprint_id).await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_num, 0);
}

#[tokio::test]
async fn test_store_clusters_unknown_fingerprint() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let result = store
        .store_clusters(uuid::Uuid::new_v4(), &[sample_cluster(0, vec![])])
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_insert_positions_twice_conflicts() {
    let harness = TestStore::new().await.expect("Failed to create store");
    let store = harness.store();

    let params = ingestion_params("write-once").to_param_set();
    let (fingerprint, _) = store.resolve(&params).await.unwrap();

    store
        .insert_positions(fingerprint.fingerprint_id, &sample_positions(3))
        .await
        .unwrap();

    let result = store
        .insert_positions(fingerprint.fingerprint_id, &sample_positions(2))
        .await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
    assert_eq!(store.count_positions(fingerprint.fingerprint_id).await.unwrap(), 3);
}
