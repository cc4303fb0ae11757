//! Database models mapping to the artifact store schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Fingerprints
// =============================================================================

/// Content-addressed fingerprint of one analysis run.
///
/// `hash_value` is the hex digest of the normalized parameter payload and is
/// globally unique; `params` holds the payload itself as canonical JSON.
#[derive(Debug, Clone, FromRow)]
pub struct FingerprintRow {
    pub fingerprint_id: Uuid,
    pub hash_value: String,
    pub state: String,
    pub params: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Users and datasets
// =============================================================================

/// Registered user. Credential material lives outside this store.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: OffsetDateTime,
}

/// Uploaded dataset, owned by one user and rooted at its ingestion
/// fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct DatasetRow {
    pub dataset_id: Uuid,
    pub dataset_name: String,
    pub owner_user_id: Uuid,
    pub ingestion_fingerprint_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// Link row associating a dataset with one analysis fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisLinkRow {
    pub dataset_id: Uuid,
    pub analysis_fingerprint_id: Uuid,
}

// =============================================================================
// Positions
// =============================================================================

/// Normalized trajectory point belonging to an ingestion fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct PositionRow {
    pub position_id: Uuid,
    pub fingerprint_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

/// Input for a bulk position insert; the store assigns ids.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

// =============================================================================
// Cluster artifacts
// =============================================================================

/// One cluster discovered under one clustering fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct ClusterRow {
    pub fingerprint_id: Uuid,
    pub cluster_num: i64,
}

/// Membership of one position in one cluster.
#[derive(Debug, Clone, FromRow)]
pub struct ClusterMemberRow {
    pub fingerprint_id: Uuid,
    pub cluster_num: i64,
    pub position_id: Uuid,
}

/// Aggregate statistics, one-to-one with a cluster.
#[derive(Debug, Clone, FromRow)]
pub struct ClusterStatsRow {
    pub fingerprint_id: Uuid,
    pub cluster_num: i64,
    pub average_speed: Option<f64>,
    pub average_course: Option<f64>,
}

/// One vertex of a cluster's boundary polygon. `point_index` carries the
/// insertion order, which defines the polygon winding.
#[derive(Debug, Clone, FromRow)]
pub struct PolygonPointRow {
    pub fingerprint_id: Uuid,
    pub cluster_num: i64,
    pub point_index: i64,
    pub x: f64,
    pub y: f64,
}

/// Externally computed clustering output for one cluster, as handed to
/// `store_clusters`.
#[derive(Debug, Clone)]
pub struct ClusterArtifact {
    pub cluster_num: i64,
    pub member_position_ids: Vec<Uuid>,
    pub average_speed: Option<f64>,
    pub average_course: Option<f64>,
    /// Boundary polygon vertices in winding order.
    pub polygon: Vec<(f64, f64)>,
}

// =============================================================================
// Routing graphs
// =============================================================================

/// Routing graph scoped to one cluster artifact.
///
/// `build_fingerprint_id` is the fingerprint of the graph-build parameters,
/// unique per graph, and is how a later pathfinding request with identical
/// parameters reuses the graph instead of rebuilding it.
#[derive(Debug, Clone, FromRow)]
pub struct GraphRow {
    pub graph_id: Uuid,
    pub build_fingerprint_id: Uuid,
    pub fingerprint_id: Uuid,
    pub cluster_num: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct VertexRow {
    pub vertex_id: Uuid,
    pub graph_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

/// Directed weighted edge. Self-loops and parallel edges are permitted;
/// the producing algorithm decides whether to emit them.
#[derive(Debug, Clone, FromRow)]
pub struct EdgeRow {
    pub edge_id: Uuid,
    pub graph_id: Uuid,
    pub start_vertex_id: Uuid,
    pub end_vertex_id: Uuid,
    pub weight: f64,
}

/// One step of a computed route. Steps sharing a `route_id` form the path,
/// ordered by `step_index`.
#[derive(Debug, Clone, FromRow)]
pub struct RouteStepRow {
    pub route_id: Uuid,
    pub step_index: i64,
    pub edge_id: Uuid,
}

/// Input vertex for a graph store; ids are caller-assigned so edges can
/// reference vertices inserted in the same call.
#[derive(Debug, Clone)]
pub struct NewVertex {
    pub vertex_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

/// Input edge for a graph store.
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub edge_id: Uuid,
    pub start_vertex_id: Uuid,
    pub end_vertex_id: Uuid,
    pub weight: f64,
}

// =============================================================================
// Cascade and sweep statistics
// =============================================================================

/// Row counts removed by one cascade deletion.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CascadeStats {
    pub fingerprints: u64,
    pub datasets: u64,
    pub analysis_links: u64,
    pub positions: u64,
    pub clusters: u64,
    pub cluster_members: u64,
    pub cluster_stats: u64,
    pub polygon_points: u64,
    pub graphs: u64,
    pub vertices: u64,
    pub edges: u64,
    pub route_steps: u64,
}

impl CascadeStats {
    /// Total rows removed across all tables.
    pub fn total_rows(&self) -> u64 {
        self.fingerprints
            + self.datasets
            + self.analysis_links
            + self.positions
            + self.clusters
            + self.cluster_members
            + self.cluster_stats
            + self.polygon_points
            + self.graphs
            + self.vertices
            + self.edges
            + self.route_steps
    }

    /// Fold another cascade's counts into this one.
    pub fn absorb(&mut self, other: &CascadeStats) {
        self.fingerprints += other.fingerprints;
        self.datasets += other.datasets;
        self.analysis_links += other.analysis_links;
        self.positions += other.positions;
        self.clusters += other.clusters;
        self.cluster_members += other.cluster_members;
        self.cluster_stats += other.cluster_stats;
        self.polygon_points += other.polygon_points;
        self.graphs += other.graphs;
        self.vertices += other.vertices;
        self.edges += other.edges;
        self.route_steps += other.route_steps;
    }
}

/// Statistics from one orphan sweep pass.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SweepStats {
    /// Fingerprints examined as candidates.
    pub fingerprints_examined: u64,
    /// Fingerprints reclaimed.
    pub fingerprints_deleted: u64,
    /// Total rows removed, fingerprint rows included.
    pub rows_deleted: u64,
}
