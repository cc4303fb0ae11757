//! Routing graph repository.

use crate::error::StoreResult;
use crate::models::{EdgeRow, GraphRow, NewEdge, NewVertex, VertexRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for routing graphs and computed routes.
#[async_trait]
pub trait GraphRepo: Send + Sync {
    /// Record an externally built graph under a cluster artifact.
    ///
    /// `build_fingerprint_id` is the resolved fingerprint of the graph-build
    /// parameters; it transitions to `ready` in the same transaction. Fails
    /// with `NotFound` if the `(fingerprint_id, cluster_num)` pair has no
    /// cluster artifact and `Conflict` if a graph was already recorded under
    /// the build fingerprint.
    async fn store_graph(
        &self,
        fingerprint_id: Uuid,
        cluster_num: i64,
        build_fingerprint_id: Uuid,
        vertices: &[NewVertex],
        edges: &[NewEdge],
    ) -> StoreResult<Uuid>;

    /// Get a graph by id.
    async fn get_graph(&self, graph_id: Uuid) -> StoreResult<Option<GraphRow>>;

    /// Get the graph recorded under a build fingerprint, if any. This is the
    /// cache-hit path for a pathfinding request with recurring parameters.
    async fn get_graph_by_build_fingerprint(
        &self,
        build_fingerprint_id: Uuid,
    ) -> StoreResult<Option<GraphRow>>;

    /// All graphs built over one cluster artifact.
    async fn list_graphs_for_cluster(
        &self,
        fingerprint_id: Uuid,
        cluster_num: i64,
    ) -> StoreResult<Vec<GraphRow>>;

    /// Vertices of a graph.
    async fn get_vertices(&self, graph_id: Uuid) -> StoreResult<Vec<VertexRow>>;

    /// Edges of a graph.
    async fn get_edges(&self, graph_id: Uuid) -> StoreResult<Vec<EdgeRow>>;

    /// Record a computed path as an ordered sequence of edge references.
    ///
    /// Fails with `NotFound` if the graph is absent or any edge does not
    /// belong to it. Returns the id of the recorded route.
    async fn append_route(&self, graph_id: Uuid, edge_ids: &[Uuid]) -> StoreResult<Uuid>;

    /// Read a route back as its edges, in recorded order. Fails with
    /// `NotFound` for an unknown route id.
    async fn get_route(&self, route_id: Uuid) -> StoreResult<Vec<EdgeRow>>;
}
