//! Test data builders.

// Not every test binary uses every builder.
#![allow(dead_code)]

use fairway_core::{ClusteringParams, GraphParams, IngestionParams, ParamSet, ParamsDigest};
use fairway_store::TrajectoryStore;
use fairway_store::models::{
    ClusterArtifact, DatasetRow, NewEdge, NewPosition, NewVertex, UserRow,
};
use time::OffsetDateTime;
use uuid::Uuid;

pub fn ingestion_params(seed: &str) -> IngestionParams {
    IngestionParams {
        source_digest: ParamsDigest::compute(seed.as_bytes()).to_hex(),
        interpolation: true,
        max_gap_minutes: 30.0,
    }
}

pub fn clustering_params(dataset_id: Uuid, eps: f64, min_points: i64) -> ClusteringParams {
    ClusteringParams {
        dataset_id,
        eps,
        min_points,
        extra: ParamSet::new(),
    }
}

pub fn graph_params(clustering_digest: ParamsDigest, cluster_num: i64) -> GraphParams {
    GraphParams {
        clustering_digest,
        cluster_num,
        search_algorithm: "astar".to_string(),
        points_inside: false,
        start_lat: 55.0,
        start_lon: 12.0,
        end_lat: 55.5,
        end_lon: 12.5,
        extra: ParamSet::new(),
    }
}

/// A handful of positions around the Øresund strait.
pub fn sample_positions(count: usize) -> Vec<NewPosition> {
    (0..count)
        .map(|i| NewPosition {
            latitude: 55.6 + i as f64 * 0.01,
            longitude: 12.6 + i as f64 * 0.01,
            speed: Some(8.0 + i as f64),
            course: Some(90.0),
        })
        .collect()
}

pub fn sample_cluster(cluster_num: i64, member_position_ids: Vec<Uuid>) -> ClusterArtifact {
    ClusterArtifact {
        cluster_num,
        member_position_ids,
        average_speed: Some(9.5),
        average_course: Some(88.0),
        polygon: vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
    }
}

pub async fn create_user(store: &dyn TrajectoryStore, username: &str) -> UserRow {
    let user = UserRow {
        user_id: Uuid::new_v4(),
        username: username.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.create_user(&user).await.expect("Failed to create user");
    user
}

/// Resolve an ingestion fingerprint, store positions under it, and register
/// a dataset on top. Returns the dataset row and the stored position ids.
pub async fn create_dataset_with_positions(
    store: &dyn TrajectoryStore,
    owner: &UserRow,
    name: &str,
    seed: &str,
    position_count: usize,
) -> (DatasetRow, Vec<Uuid>) {
    let params = ingestion_params(seed);
    let (fingerprint, _) = store
        .resolve(&params.to_param_set())
        .await
        .expect("Failed to resolve fingerprint");
    let position_ids = store
        .insert_positions(fingerprint.fingerprint_id, &sample_positions(position_count))
        .await
        .expect("Failed to insert positions");

    let dataset = DatasetRow {
        dataset_id: Uuid::new_v4(),
        dataset_name: name.to_string(),
        owner_user_id: owner.user_id,
        ingestion_fingerprint_id: fingerprint.fingerprint_id,
        created_at: OffsetDateTime::now_utc(),
    };
    store
        .create_dataset(&dataset)
        .await
        .expect("Failed to create dataset");
    (dataset, position_ids)
}

/// Store a clustering run with one cluster over the given members and link
/// it to the dataset. Returns the clustering fingerprint id.
pub async fn create_clustering(
    store: &dyn TrajectoryStore,
    dataset_id: Uuid,
    eps: f64,
    member_position_ids: Vec<Uuid>,
) -> Uuid {
    let params = clustering_params(dataset_id, eps, 5);
    let (fingerprint, _) = store
        .resolve(&params.to_param_set())
        .await
        .expect("Failed to resolve clustering fingerprint");
    store
        .store_clusters(
            fingerprint.fingerprint_id,
            &[sample_cluster(0, member_position_ids)],
        )
        .await
        .expect("Failed to store clusters");
    store
        .link_analysis(dataset_id, fingerprint.fingerprint_id)
        .await
        .expect("Failed to link analysis");
    fingerprint.fingerprint_id
}

/// Two vertices joined by one edge.
pub fn small_graph() -> (Vec<NewVertex>, Vec<NewEdge>) {
    let v1 = NewVertex {
        vertex_id: Uuid::new_v4(),
        latitude: 55.0,
        longitude: 12.0,
    };
    let v2 = NewVertex {
        vertex_id: Uuid::new_v4(),
        latitude: 55.5,
        longitude: 12.5,
    };
    let edge = NewEdge {
        edge_id: Uuid::new_v4(),
        start_vertex_id: v1.vertex_id,
        end_vertex_id: v2.vertex_id,
        weight: 1.0,
    };
    (vec![v1, v2], vec![edge])
}
