//! Cluster artifact repository.

use crate::error::StoreResult;
use crate::models::{ClusterArtifact, ClusterRow, ClusterStatsRow, PolygonPointRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for cluster artifact sets.
#[async_trait]
pub trait ClusterRepo: Send + Sync {
    /// Record an externally computed clustering under its fingerprint.
    ///
    /// Writes cluster rows, memberships, statistics, and boundary polygons
    /// (preserving point order) as one atomic unit and transitions the
    /// fingerprint to `ready`. Fails with `NotFound` if the fingerprint is
    /// absent and `Conflict` if artifacts were already recorded under it.
    async fn store_clusters(
        &self,
        fingerprint_id: Uuid,
        clusters: &[ClusterArtifact],
    ) -> StoreResult<()>;

    /// All clusters under a fingerprint, ordered by cluster number.
    async fn get_clusters(&self, fingerprint_id: Uuid) -> StoreResult<Vec<ClusterRow>>;

    /// Member position ids of one cluster.
    async fn get_cluster_members(
        &self,
        fingerprint_id: Uuid,
        cluster_num: i64,
    ) -> StoreResult<Vec<Uuid>>;

    /// Aggregate statistics of one cluster.
    async fn get_cluster_stats(
        &self,
        fingerprint_id: Uuid,
        cluster_num: i64,
    ) -> StoreResult<Option<ClusterStatsRow>>;

    /// Boundary polygon of one cluster, in stored point order.
    async fn get_cluster_polygon(
        &self,
        fingerprint_id: Uuid,
        cluster_num: i64,
    ) -> StoreResult<Vec<PolygonPointRow>>;
}
