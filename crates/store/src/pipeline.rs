//! Cache-aware analysis flows.
//!
//! Each flow resolves a parameter fingerprint first and only invokes the
//! caller's computation closure on a miss; on a hit the stored artifacts are
//! reused as-is. The closures are plain `FnOnce` producers so callers pay
//! for clustering or graph construction only when the cache says so.

use crate::error::{StoreError, StoreResult};
use crate::models::{
    ClusterArtifact, DatasetRow, FingerprintRow, GraphRow, NewEdge, NewPosition, NewVertex,
};
use crate::store::TrajectoryStore;
use fairway_core::{
    AnalysisContext, CacheOutcome, ClusteringParams, FingerprintId, FingerprintState, GraphParams,
    IngestionParams, ParamsDigest,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Result of registering a dataset through the ingestion flow.
#[derive(Debug)]
pub struct IngestionOutcome {
    pub dataset: DatasetRow,
    pub fingerprint: FingerprintRow,
    pub fingerprint_id: FingerprintId,
    pub outcome: CacheOutcome,
}

/// Result of recording a clustering run.
#[derive(Debug)]
pub struct ClusteringOutcome {
    pub fingerprint: FingerprintRow,
    pub fingerprint_id: FingerprintId,
    /// Digest selected into the analysis context for subsequent graph builds.
    pub pointer: ParamsDigest,
    pub outcome: CacheOutcome,
}

/// Result of recording a routing graph.
#[derive(Debug)]
pub struct GraphOutcome {
    pub graph: GraphRow,
    pub build_fingerprint_id: FingerprintId,
    pub outcome: CacheOutcome,
}

/// Register a dataset under a normalized ingestion run.
///
/// The position set is computed and stored only when the ingestion
/// parameters have not been seen before; a second dataset with the same
/// parameters shares the existing fingerprint and its positions. A
/// fingerprint still pending from an aborted run is treated as a miss and
/// normalized again.
pub async fn ingest_dataset<S, F>(
    store: &S,
    dataset_name: &str,
    owner_user_id: Uuid,
    params: &IngestionParams,
    normalize: F,
) -> StoreResult<IngestionOutcome>
where
    S: TrajectoryStore + ?Sized,
    F: FnOnce() -> Vec<NewPosition>,
{
    let (fingerprint, _) = store.resolve(&params.to_param_set()).await?;
    // A pending fingerprint left behind by an aborted run carries no
    // positions, so only a ready one counts as a hit.
    let outcome = if FingerprintState::parse(&fingerprint.state)?.accepts_artifacts() {
        let positions = normalize();
        store
            .insert_positions(fingerprint.fingerprint_id, &positions)
            .await?;
        CacheOutcome::Miss
    } else {
        CacheOutcome::Hit
    };

    let dataset = DatasetRow {
        dataset_id: Uuid::new_v4(),
        dataset_name: dataset_name.to_string(),
        owner_user_id,
        ingestion_fingerprint_id: fingerprint.fingerprint_id,
        created_at: OffsetDateTime::now_utc(),
    };
    store.create_dataset(&dataset).await?;

    let fingerprint_id = FingerprintId::from(fingerprint.fingerprint_id);
    Ok(IngestionOutcome {
        dataset,
        fingerprint,
        fingerprint_id,
        outcome,
    })
}

/// Record a clustering run against a dataset and select it into the
/// analysis context.
///
/// On a miss the `compute` closure produces the cluster artifacts; on a hit
/// it is never called. A fingerprint still pending from an aborted run is
/// treated as a miss. Either way the dataset is linked to the clustering
/// fingerprint (idempotently) and the context pointer is updated, so a
/// repeated run with identical parameters leaves exactly one link behind.
pub async fn record_clustering<S, F>(
    store: &S,
    ctx: &mut AnalysisContext,
    params: &ClusteringParams,
    compute: F,
) -> StoreResult<ClusteringOutcome>
where
    S: TrajectoryStore + ?Sized,
    F: FnOnce() -> Vec<ClusterArtifact>,
{
    let param_set = params.to_param_set();
    let (fingerprint, _) = store.resolve(&param_set).await?;
    // A pending fingerprint left behind by an aborted run has no cluster
    // artifacts yet; linking it as a hit would both serve an empty result
    // and shield the row from the orphan sweep.
    let outcome = if FingerprintState::parse(&fingerprint.state)?.accepts_artifacts() {
        let clusters = compute();
        store
            .store_clusters(fingerprint.fingerprint_id, &clusters)
            .await?;
        CacheOutcome::Miss
    } else {
        CacheOutcome::Hit
    };

    store
        .link_analysis(params.dataset_id, fingerprint.fingerprint_id)
        .await?;

    let pointer = param_set.digest()?;
    ctx.select(pointer);

    let fingerprint_id = FingerprintId::from(fingerprint.fingerprint_id);
    Ok(ClusteringOutcome {
        fingerprint,
        fingerprint_id,
        pointer,
        outcome,
    })
}

/// Record a routing graph for a cluster of the currently selected
/// clustering run.
///
/// Fails with `NotFound` when no clustering run is selected, and with
/// `Conflict` when the graph parameters were derived from a different
/// clustering run than the one the context points at. The `build` closure
/// produces vertices and edges only when no graph exists for this
/// parameter combination yet.
pub async fn record_graph<S, F>(
    store: &S,
    ctx: &AnalysisContext,
    params: &GraphParams,
    build: F,
) -> StoreResult<GraphOutcome>
where
    S: TrajectoryStore + ?Sized,
    F: FnOnce() -> (Vec<NewVertex>, Vec<NewEdge>),
{
    let pointer = ctx.current().ok_or_else(|| {
        StoreError::NotFound("no clustering run selected; run clustering first".to_string())
    })?;
    if *pointer != params.clustering_digest {
        return Err(StoreError::Conflict(
            "graph parameters are bound to a different clustering run".to_string(),
        ));
    }

    let clustering = store.get_by_hash(pointer).await?.ok_or_else(|| {
        StoreError::NotFound(format!(
            "clustering fingerprint {} not found",
            pointer.to_hex()
        ))
    })?;

    let (build_fp, _) = store.resolve(&params.to_param_set()).await?;

    // The fingerprint may be a leftover pending row from an aborted build;
    // only an actual graph row counts as a hit.
    if let Some(graph) = store
        .get_graph_by_build_fingerprint(build_fp.fingerprint_id)
        .await?
    {
        return Ok(GraphOutcome {
            graph,
            build_fingerprint_id: FingerprintId::from(build_fp.fingerprint_id),
            outcome: CacheOutcome::Hit,
        });
    }

    let (vertices, edges) = build();
    let graph_id = store
        .store_graph(
            clustering.fingerprint_id,
            params.cluster_num,
            build_fp.fingerprint_id,
            &vertices,
            &edges,
        )
        .await?;

    let graph = store.get_graph(graph_id).await?.ok_or_else(|| {
        StoreError::Internal(format!("graph {graph_id} missing after store"))
    })?;

    Ok(GraphOutcome {
        graph,
        build_fingerprint_id: FingerprintId::from(build_fp.fingerprint_id),
        outcome: CacheOutcome::Miss,
    })
}
