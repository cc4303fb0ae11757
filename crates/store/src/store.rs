//! Artifact store trait and SQLite implementation.

use crate::error::{StoreError, StoreResult};
use crate::repos::{
    AnalysisLinkRepo, ClusterRepo, DatasetRepo, FingerprintRepo, GraphRepo, PositionRepo,
    SweepRepo, UserRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined artifact store trait.
#[async_trait]
pub trait TrajectoryStore:
    FingerprintRepo
    + UserRepo
    + DatasetRepo
    + PositionRepo
    + AnalysisLinkRepo
    + ClusterRepo
    + GraphRepo
    + SweepRepo
    + Send
    + Sync
{
    /// Create the schema if it does not exist yet.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;
}

/// SQLite-based artifact store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Referential integrity on every connection; composite foreign
            // keys on the cluster artifact tables depend on it.
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(query_timeout_secs.unwrap_or(5)));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes artifact writes against cascade
            // deletes of the same fingerprint and avoids persistent
            // "database is locked" failures under concurrent workers.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl TrajectoryStore for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Delete every row rooted at a fingerprint, bottom-up, inside the caller's
/// transaction. The walk is explicit rather than relying on SQLite's FK
/// cascade so the ordering is visible and the row counts land in `stats`.
///
/// When the fingerprint is a clustering run, the build fingerprints of
/// routing graphs under its clusters are removed as well; they cannot
/// outlive the graphs they key.
async fn cascade_fingerprint(
    tx: &mut sqlx::SqliteConnection,
    fingerprint_id: uuid::Uuid,
    stats: &mut crate::models::CascadeStats,
) -> StoreResult<()> {
    use uuid::Uuid;

    // Graphs hang off this fingerprint either through a cluster artifact
    // (clustering fingerprint) or through their build fingerprint.
    let graph_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT graph_id FROM graphs WHERE fingerprint_id = ? OR build_fingerprint_id = ?",
    )
    .bind(fingerprint_id)
    .bind(fingerprint_id)
    .fetch_all(&mut *tx)
    .await?;

    let orphaned_build_fps: Vec<Uuid> = sqlx::query_scalar(
        "SELECT build_fingerprint_id FROM graphs WHERE fingerprint_id = ? AND build_fingerprint_id != ?",
    )
    .bind(fingerprint_id)
    .bind(fingerprint_id)
    .fetch_all(&mut *tx)
    .await?;

    for graph_id in &graph_ids {
        let result = sqlx::query(
            "DELETE FROM route_steps WHERE edge_id IN (SELECT edge_id FROM graph_edges WHERE graph_id = ?)",
        )
        .bind(graph_id)
        .execute(&mut *tx)
        .await?;
        stats.route_steps += result.rows_affected();

        let result = sqlx::query("DELETE FROM graph_edges WHERE graph_id = ?")
            .bind(graph_id)
            .execute(&mut *tx)
            .await?;
        stats.edges += result.rows_affected();

        let result = sqlx::query("DELETE FROM graph_vertices WHERE graph_id = ?")
            .bind(graph_id)
            .execute(&mut *tx)
            .await?;
        stats.vertices += result.rows_affected();

        let result = sqlx::query("DELETE FROM graphs WHERE graph_id = ?")
            .bind(graph_id)
            .execute(&mut *tx)
            .await?;
        stats.graphs += result.rows_affected();
    }

    for build_fp in &orphaned_build_fps {
        let result = sqlx::query("DELETE FROM fingerprints WHERE fingerprint_id = ?")
            .bind(build_fp)
            .execute(&mut *tx)
            .await?;
        stats.fingerprints += result.rows_affected();
    }

    let result = sqlx::query("DELETE FROM polygon_points WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.polygon_points += result.rows_affected();

    let result = sqlx::query("DELETE FROM cluster_stats WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.cluster_stats += result.rows_affected();

    let result = sqlx::query("DELETE FROM cluster_members WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.cluster_members += result.rows_affected();

    let result = sqlx::query("DELETE FROM clusters WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.clusters += result.rows_affected();

    // Surviving shared analysis fingerprints may hold membership rows over
    // these positions. Remove them explicitly so the count lands in stats
    // instead of the positions FK cascading them away silently.
    let result = sqlx::query(
        "DELETE FROM cluster_members WHERE position_id IN (SELECT position_id FROM positions WHERE fingerprint_id = ?)",
    )
    .bind(fingerprint_id)
    .execute(&mut *tx)
    .await?;
    stats.cluster_members += result.rows_affected();

    let result = sqlx::query("DELETE FROM positions WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.positions += result.rows_affected();

    let result = sqlx::query("DELETE FROM analysis_links WHERE analysis_fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.analysis_links += result.rows_affected();

    // Datasets rooted at this fingerprint go with it; their own analysis
    // links have to go first. The analysis fingerprints behind those links
    // stay, they become sweep candidates once nothing else references them.
    let result = sqlx::query(
        "DELETE FROM analysis_links WHERE dataset_id IN (SELECT dataset_id FROM datasets WHERE ingestion_fingerprint_id = ?)",
    )
    .bind(fingerprint_id)
    .execute(&mut *tx)
    .await?;
    stats.analysis_links += result.rows_affected();

    let result = sqlx::query("DELETE FROM datasets WHERE ingestion_fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.datasets += result.rows_affected();

    let result = sqlx::query("DELETE FROM fingerprints WHERE fingerprint_id = ?")
        .bind(fingerprint_id)
        .execute(&mut *tx)
        .await?;
    stats.fingerprints += result.rows_affected();

    Ok(())
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use fairway_core::{CacheOutcome, FingerprintState, ParamSet, ParamsDigest};
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// Fetch a fingerprint row inside a transaction and decode its state.
    async fn fingerprint_state(
        tx: &mut sqlx::SqliteConnection,
        fingerprint_id: Uuid,
    ) -> StoreResult<FingerprintState> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM fingerprints WHERE fingerprint_id = ?")
                .bind(fingerprint_id)
                .fetch_optional(&mut *tx)
                .await?;
        let state = state.ok_or_else(|| {
            StoreError::NotFound(format!("fingerprint {fingerprint_id} not found"))
        })?;
        Ok(FingerprintState::parse(&state)?)
    }

    #[async_trait]
    impl FingerprintRepo for SqliteStore {
        async fn resolve(&self, params: &ParamSet) -> StoreResult<(FingerprintRow, CacheOutcome)> {
            let digest = params.digest()?;
            let hash_value = digest.to_hex();
            let payload = String::from_utf8(params.canonical_json()?)
                .map_err(|e| StoreError::Internal(format!("non-utf8 payload: {e}")))?;

            // Two attempts are enough: losing the insert race means the row
            // exists, so the second read must succeed.
            const MAX_ATTEMPTS: u32 = 2;
            for _attempt in 0..MAX_ATTEMPTS {
                if let Some(row) = self.get_by_hash(&digest).await? {
                    return Ok((row, CacheOutcome::Hit));
                }

                let row = FingerprintRow {
                    fingerprint_id: Uuid::new_v4(),
                    hash_value: hash_value.clone(),
                    state: FingerprintState::Pending.as_str().to_string(),
                    params: payload.clone(),
                    created_at: OffsetDateTime::now_utc(),
                };

                let insert = sqlx::query(
                    "INSERT INTO fingerprints (fingerprint_id, hash_value, state, params, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(row.fingerprint_id)
                .bind(&row.hash_value)
                .bind(&row.state)
                .bind(&row.params)
                .bind(row.created_at)
                .execute(&self.pool)
                .await;

                match insert {
                    Ok(_) => {
                        tracing::debug!(hash_value = %row.hash_value, "fingerprint cache miss");
                        return Ok((row, CacheOutcome::Miss));
                    }
                    Err(e) if StoreError::is_unique_violation(&e) => {
                        // Lost the digest race; re-read the winner's row.
                        tracing::debug!(hash_value = %hash_value, "lost fingerprint insert race");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Err(StoreError::Internal(format!(
                "failed to resolve fingerprint {hash_value} after retries"
            )))
        }

        async fn get_by_hash(&self, digest: &ParamsDigest) -> StoreResult<Option<FingerprintRow>> {
            let row = sqlx::query_as::<_, FingerprintRow>(
                "SELECT * FROM fingerprints WHERE hash_value = ?",
            )
            .bind(digest.to_hex())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_fingerprint(
            &self,
            fingerprint_id: Uuid,
        ) -> StoreResult<Option<FingerprintRow>> {
            let row = sqlx::query_as::<_, FingerprintRow>(
                "SELECT * FROM fingerprints WHERE fingerprint_id = ?",
            )
            .bind(fingerprint_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn delete_fingerprint(&self, fingerprint_id: Uuid) -> StoreResult<CascadeStats> {
            let mut tx = self.pool.begin().await?;

            let exists: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM fingerprints WHERE fingerprint_id = ?")
                    .bind(fingerprint_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(StoreError::NotFound(format!(
                    "fingerprint {fingerprint_id} not found"
                )));
            }

            let mut stats = CascadeStats::default();
            cascade_fingerprint(&mut tx, fingerprint_id, &mut stats).await?;
            tx.commit().await?;

            tracing::info!(
                %fingerprint_id,
                rows = stats.total_rows(),
                "fingerprint subtree deleted"
            );
            Ok(stats)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> StoreResult<()> {
            if self.get_user_by_name(&user.username).await?.is_some() {
                return Err(StoreError::AlreadyExists(format!(
                    "username '{}' already exists",
                    user.username
                )));
            }

            let insert =
                sqlx::query("INSERT INTO users (user_id, username, created_at) VALUES (?, ?, ?)")
                    .bind(user.user_id)
                    .bind(&user.username)
                    .bind(user.created_at)
                    .execute(&self.pool)
                    .await;
            match insert {
                Ok(_) => Ok(()),
                // The pre-check races with concurrent creation; the loser of
                // the insert gets the same error as a sequential duplicate.
                Err(e) if StoreError::is_unique_violation(&e) => Err(StoreError::AlreadyExists(
                    format!("username '{}' already exists", user.username),
                )),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_name(&self, username: &str) -> StoreResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn delete_user(&self, user_id: Uuid) -> StoreResult<CascadeStats> {
            let mut tx = self.pool.begin().await?;

            let exists: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM users WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(StoreError::NotFound(format!("user {user_id} not found")));
            }

            let datasets = sqlx::query_as::<_, DatasetRow>(
                "SELECT * FROM datasets WHERE owner_user_id = ? ORDER BY created_at, dataset_id",
            )
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

            let mut stats = CascadeStats::default();
            for dataset in &datasets {
                remove_dataset_row(&mut tx, dataset, &mut stats).await?;
            }

            sqlx::query("DELETE FROM users WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!(
                %user_id,
                datasets = datasets.len(),
                rows = stats.total_rows(),
                "user deleted with owned datasets"
            );
            Ok(stats)
        }
    }

    /// Remove one dataset row plus its analysis links, then reclaim whatever
    /// the removal orphaned: the ingestion fingerprint when this was the
    /// last dataset rooted at it, and each linked analysis fingerprint whose
    /// last link just went away. Runs inside the caller's transaction.
    async fn remove_dataset_row(
        tx: &mut sqlx::SqliteConnection,
        dataset: &DatasetRow,
        stats: &mut CascadeStats,
    ) -> StoreResult<()> {
        let linked_analyses: Vec<Uuid> = sqlx::query_scalar(
            "SELECT analysis_fingerprint_id FROM analysis_links WHERE dataset_id = ?",
        )
        .bind(dataset.dataset_id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM analysis_links WHERE dataset_id = ?")
            .bind(dataset.dataset_id)
            .execute(&mut *tx)
            .await?;
        stats.analysis_links += result.rows_affected();

        let result = sqlx::query("DELETE FROM datasets WHERE dataset_id = ?")
            .bind(dataset.dataset_id)
            .execute(&mut *tx)
            .await?;
        stats.datasets += result.rows_affected();

        // Orphaned analyses go before the ingestion fingerprint so their
        // cluster members are removed while the positions they reference
        // still exist.
        for analysis_fp in linked_analyses {
            let links: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM analysis_links WHERE analysis_fingerprint_id = ?",
            )
            .bind(analysis_fp)
            .fetch_one(&mut *tx)
            .await?;
            if links == 0 {
                cascade_fingerprint(tx, analysis_fp, stats).await?;
            }
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM datasets WHERE ingestion_fingerprint_id = ?")
                .bind(dataset.ingestion_fingerprint_id)
                .fetch_one(&mut *tx)
                .await?;
        if remaining == 0 {
            cascade_fingerprint(tx, dataset.ingestion_fingerprint_id, stats).await?;
        }
        Ok(())
    }

    #[async_trait]
    impl DatasetRepo for SqliteStore {
        async fn create_dataset(&self, dataset: &DatasetRow) -> StoreResult<()> {
            let name_taken: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM datasets WHERE dataset_name = ?")
                    .bind(&dataset.dataset_name)
                    .fetch_optional(&self.pool)
                    .await?;
            if name_taken.is_some() {
                return Err(StoreError::AlreadyExists(format!(
                    "dataset name '{}' already exists",
                    dataset.dataset_name
                )));
            }

            if self.get_user(dataset.owner_user_id).await?.is_none() {
                return Err(StoreError::NotFound(format!(
                    "user {} not found",
                    dataset.owner_user_id
                )));
            }
            if self
                .get_fingerprint(dataset.ingestion_fingerprint_id)
                .await?
                .is_none()
            {
                return Err(StoreError::NotFound(format!(
                    "fingerprint {} not found",
                    dataset.ingestion_fingerprint_id
                )));
            }

            let insert = sqlx::query(
                "INSERT INTO datasets (dataset_id, dataset_name, owner_user_id, ingestion_fingerprint_id, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(dataset.dataset_id)
            .bind(&dataset.dataset_name)
            .bind(dataset.owner_user_id)
            .bind(dataset.ingestion_fingerprint_id)
            .bind(dataset.created_at)
            .execute(&self.pool)
            .await;
            match insert {
                Ok(_) => Ok(()),
                // The name pre-check races with concurrent creation; map the
                // losing insert to the same duplicate error.
                Err(e) if StoreError::is_unique_violation(&e) => Err(StoreError::AlreadyExists(
                    format!("dataset name '{}' already exists", dataset.dataset_name),
                )),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_dataset(&self, dataset_id: Uuid) -> StoreResult<Option<DatasetRow>> {
            let row = sqlx::query_as::<_, DatasetRow>(
                "SELECT * FROM datasets WHERE dataset_id = ?",
            )
            .bind(dataset_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_datasets_for_user(&self, user_id: Uuid) -> StoreResult<Vec<DatasetRow>> {
            let rows = sqlx::query_as::<_, DatasetRow>(
                "SELECT * FROM datasets WHERE owner_user_id = ? ORDER BY created_at, dataset_id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_dataset(
            &self,
            dataset_id: Uuid,
            requesting_user_id: Uuid,
        ) -> StoreResult<CascadeStats> {
            let mut tx = self.pool.begin().await?;

            let dataset = sqlx::query_as::<_, DatasetRow>(
                "SELECT * FROM datasets WHERE dataset_id = ?",
            )
            .bind(dataset_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("dataset {dataset_id} not found")))?;

            if dataset.owner_user_id != requesting_user_id {
                return Err(StoreError::Forbidden(format!(
                    "dataset {dataset_id} is not owned by user {requesting_user_id}"
                )));
            }

            let mut stats = CascadeStats::default();
            remove_dataset_row(&mut tx, &dataset, &mut stats).await?;
            tx.commit().await?;

            tracing::info!(
                %dataset_id,
                rows = stats.total_rows(),
                "dataset deleted"
            );
            Ok(stats)
        }
    }

    #[async_trait]
    impl PositionRepo for SqliteStore {
        async fn insert_positions(
            &self,
            fingerprint_id: Uuid,
            positions: &[NewPosition],
        ) -> StoreResult<Vec<Uuid>> {
            let mut tx = self.pool.begin().await?;

            let state = fingerprint_state(&mut tx, fingerprint_id).await?;
            if !state.accepts_artifacts() {
                return Err(StoreError::Conflict(format!(
                    "positions already recorded for fingerprint {fingerprint_id}"
                )));
            }

            let mut ids = Vec::with_capacity(positions.len());
            for position in positions {
                let position_id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO positions (position_id, fingerprint_id, latitude, longitude, speed, course) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(position_id)
                .bind(fingerprint_id)
                .bind(position.latitude)
                .bind(position.longitude)
                .bind(position.speed)
                .bind(position.course)
                .execute(&mut *tx)
                .await?;
                ids.push(position_id);
            }

            sqlx::query("UPDATE fingerprints SET state = ? WHERE fingerprint_id = ?")
                .bind(FingerprintState::Ready.as_str())
                .bind(fingerprint_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(ids)
        }

        async fn get_positions(&self, fingerprint_id: Uuid) -> StoreResult<Vec<PositionRow>> {
            let rows = sqlx::query_as::<_, PositionRow>(
                "SELECT * FROM positions WHERE fingerprint_id = ? ORDER BY position_id",
            )
            .bind(fingerprint_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_positions(&self, fingerprint_id: Uuid) -> StoreResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM positions WHERE fingerprint_id = ?")
                    .bind(fingerprint_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl AnalysisLinkRepo for SqliteStore {
        async fn link_analysis(
            &self,
            dataset_id: Uuid,
            analysis_fingerprint_id: Uuid,
        ) -> StoreResult<()> {
            if self.get_dataset(dataset_id).await?.is_none() {
                return Err(StoreError::NotFound(format!(
                    "dataset {dataset_id} not found"
                )));
            }
            if self.get_fingerprint(analysis_fingerprint_id).await?.is_none() {
                return Err(StoreError::NotFound(format!(
                    "fingerprint {analysis_fingerprint_id} not found"
                )));
            }

            // Idempotent: re-linking an existing pair is a no-op.
            sqlx::query(
                "INSERT OR IGNORE INTO analysis_links (dataset_id, analysis_fingerprint_id) VALUES (?, ?)",
            )
            .bind(dataset_id)
            .bind(analysis_fingerprint_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn unlink_analysis(
            &self,
            dataset_id: Uuid,
            analysis_fingerprint_id: Uuid,
        ) -> StoreResult<()> {
            let result = sqlx::query(
                "DELETE FROM analysis_links WHERE dataset_id = ? AND analysis_fingerprint_id = ?",
            )
            .bind(dataset_id)
            .bind(analysis_fingerprint_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!(
                    "no link between dataset {dataset_id} and fingerprint {analysis_fingerprint_id}"
                )));
            }
            Ok(())
        }

        async fn list_analyses(&self, dataset_id: Uuid) -> StoreResult<Vec<FingerprintRow>> {
            let rows = sqlx::query_as::<_, FingerprintRow>(
                "SELECT f.* FROM fingerprints f
                 JOIN analysis_links l ON l.analysis_fingerprint_id = f.fingerprint_id
                 WHERE l.dataset_id = ?
                 ORDER BY f.created_at, f.fingerprint_id",
            )
            .bind(dataset_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_links(&self, analysis_fingerprint_id: Uuid) -> StoreResult<u64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM analysis_links WHERE analysis_fingerprint_id = ?",
            )
            .bind(analysis_fingerprint_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl ClusterRepo for SqliteStore {
        async fn store_clusters(
            &self,
            fingerprint_id: Uuid,
            clusters: &[ClusterArtifact],
        ) -> StoreResult<()> {
            let mut tx = self.pool.begin().await?;

            let state = fingerprint_state(&mut tx, fingerprint_id).await?;
            if !state.accepts_artifacts() {
                return Err(StoreError::Conflict(format!(
                    "artifacts already recorded for fingerprint {fingerprint_id}"
                )));
            }

            for cluster in clusters {
                sqlx::query("INSERT INTO clusters (fingerprint_id, cluster_num) VALUES (?, ?)")
                    .bind(fingerprint_id)
                    .bind(cluster.cluster_num)
                    .execute(&mut *tx)
                    .await?;

                for position_id in &cluster.member_position_ids {
                    sqlx::query(
                        "INSERT INTO cluster_members (fingerprint_id, cluster_num, position_id) VALUES (?, ?, ?)",
                    )
                    .bind(fingerprint_id)
                    .bind(cluster.cluster_num)
                    .bind(position_id)
                    .execute(&mut *tx)
                    .await?;
                }

                sqlx::query(
                    "INSERT INTO cluster_stats (fingerprint_id, cluster_num, average_speed, average_course) VALUES (?, ?, ?, ?)",
                )
                .bind(fingerprint_id)
                .bind(cluster.cluster_num)
                .bind(cluster.average_speed)
                .bind(cluster.average_course)
                .execute(&mut *tx)
                .await?;

                for (index, (x, y)) in cluster.polygon.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO polygon_points (fingerprint_id, cluster_num, point_index, x, y) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(fingerprint_id)
                    .bind(cluster.cluster_num)
                    .bind(index as i64)
                    .bind(x)
                    .bind(y)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            sqlx::query("UPDATE fingerprints SET state = ? WHERE fingerprint_id = ?")
                .bind(FingerprintState::Ready.as_str())
                .bind(fingerprint_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::debug!(%fingerprint_id, clusters = clusters.len(), "cluster artifacts stored");
            Ok(())
        }

        async fn get_clusters(&self, fingerprint_id: Uuid) -> StoreResult<Vec<ClusterRow>> {
            let rows = sqlx::query_as::<_, ClusterRow>(
                "SELECT * FROM clusters WHERE fingerprint_id = ? ORDER BY cluster_num",
            )
            .bind(fingerprint_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_cluster_members(
            &self,
            fingerprint_id: Uuid,
            cluster_num: i64,
        ) -> StoreResult<Vec<Uuid>> {
            let rows: Vec<Uuid> = sqlx::query_scalar(
                "SELECT position_id FROM cluster_members WHERE fingerprint_id = ? AND cluster_num = ? ORDER BY position_id",
            )
            .bind(fingerprint_id)
            .bind(cluster_num)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_cluster_stats(
            &self,
            fingerprint_id: Uuid,
            cluster_num: i64,
        ) -> StoreResult<Option<ClusterStatsRow>> {
            let row = sqlx::query_as::<_, ClusterStatsRow>(
                "SELECT * FROM cluster_stats WHERE fingerprint_id = ? AND cluster_num = ?",
            )
            .bind(fingerprint_id)
            .bind(cluster_num)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_cluster_polygon(
            &self,
            fingerprint_id: Uuid,
            cluster_num: i64,
        ) -> StoreResult<Vec<PolygonPointRow>> {
            let rows = sqlx::query_as::<_, PolygonPointRow>(
                "SELECT * FROM polygon_points WHERE fingerprint_id = ? AND cluster_num = ? ORDER BY point_index",
            )
            .bind(fingerprint_id)
            .bind(cluster_num)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl GraphRepo for SqliteStore {
        async fn store_graph(
            &self,
            fingerprint_id: Uuid,
            cluster_num: i64,
            build_fingerprint_id: Uuid,
            vertices: &[NewVertex],
            edges: &[NewEdge],
        ) -> StoreResult<Uuid> {
            let mut tx = self.pool.begin().await?;

            let cluster_exists: Option<i32> = sqlx::query_scalar(
                "SELECT 1 FROM clusters WHERE fingerprint_id = ? AND cluster_num = ?",
            )
            .bind(fingerprint_id)
            .bind(cluster_num)
            .fetch_optional(&mut *tx)
            .await?;
            if cluster_exists.is_none() {
                return Err(StoreError::NotFound(format!(
                    "no cluster artifact ({fingerprint_id}, {cluster_num})"
                )));
            }

            let state = fingerprint_state(&mut tx, build_fingerprint_id).await?;
            if !state.accepts_artifacts() {
                return Err(StoreError::Conflict(format!(
                    "graph already recorded for build fingerprint {build_fingerprint_id}"
                )));
            }

            // Edge endpoints must come from this store call; the composite
            // schema does not scope vertex ids per graph by itself.
            let vertex_ids: std::collections::HashSet<Uuid> =
                vertices.iter().map(|v| v.vertex_id).collect();
            for edge in edges {
                if !vertex_ids.contains(&edge.start_vertex_id)
                    || !vertex_ids.contains(&edge.end_vertex_id)
                {
                    return Err(StoreError::NotFound(format!(
                        "edge {} references a vertex outside the graph",
                        edge.edge_id
                    )));
                }
            }

            let graph_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO graphs (graph_id, build_fingerprint_id, fingerprint_id, cluster_num, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(graph_id)
            .bind(build_fingerprint_id)
            .bind(fingerprint_id)
            .bind(cluster_num)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;

            for vertex in vertices {
                sqlx::query(
                    "INSERT INTO graph_vertices (vertex_id, graph_id, latitude, longitude) VALUES (?, ?, ?, ?)",
                )
                .bind(vertex.vertex_id)
                .bind(graph_id)
                .bind(vertex.latitude)
                .bind(vertex.longitude)
                .execute(&mut *tx)
                .await?;
            }

            for edge in edges {
                sqlx::query(
                    "INSERT INTO graph_edges (edge_id, graph_id, start_vertex_id, end_vertex_id, weight) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(edge.edge_id)
                .bind(graph_id)
                .bind(edge.start_vertex_id)
                .bind(edge.end_vertex_id)
                .bind(edge.weight)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("UPDATE fingerprints SET state = ? WHERE fingerprint_id = ?")
                .bind(FingerprintState::Ready.as_str())
                .bind(build_fingerprint_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::debug!(
                %graph_id,
                vertices = vertices.len(),
                edges = edges.len(),
                "routing graph stored"
            );
            Ok(graph_id)
        }

        async fn get_graph(&self, graph_id: Uuid) -> StoreResult<Option<GraphRow>> {
            let row = sqlx::query_as::<_, GraphRow>("SELECT * FROM graphs WHERE graph_id = ?")
                .bind(graph_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_graph_by_build_fingerprint(
            &self,
            build_fingerprint_id: Uuid,
        ) -> StoreResult<Option<GraphRow>> {
            let row = sqlx::query_as::<_, GraphRow>(
                "SELECT * FROM graphs WHERE build_fingerprint_id = ?",
            )
            .bind(build_fingerprint_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_graphs_for_cluster(
            &self,
            fingerprint_id: Uuid,
            cluster_num: i64,
        ) -> StoreResult<Vec<GraphRow>> {
            let rows = sqlx::query_as::<_, GraphRow>(
                "SELECT * FROM graphs WHERE fingerprint_id = ? AND cluster_num = ? ORDER BY created_at, graph_id",
            )
            .bind(fingerprint_id)
            .bind(cluster_num)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_vertices(&self, graph_id: Uuid) -> StoreResult<Vec<VertexRow>> {
            let rows = sqlx::query_as::<_, VertexRow>(
                "SELECT * FROM graph_vertices WHERE graph_id = ? ORDER BY vertex_id",
            )
            .bind(graph_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_edges(&self, graph_id: Uuid) -> StoreResult<Vec<EdgeRow>> {
            let rows = sqlx::query_as::<_, EdgeRow>(
                "SELECT * FROM graph_edges WHERE graph_id = ? ORDER BY edge_id",
            )
            .bind(graph_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn append_route(&self, graph_id: Uuid, edge_ids: &[Uuid]) -> StoreResult<Uuid> {
            if edge_ids.is_empty() {
                return Err(fairway_core::Error::InvalidParams(
                    "route must contain at least one edge".to_string(),
                )
                .into());
            }

            let mut tx = self.pool.begin().await?;

            let graph_exists: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM graphs WHERE graph_id = ?")
                    .bind(graph_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if graph_exists.is_none() {
                return Err(StoreError::NotFound(format!("graph {graph_id} not found")));
            }

            let route_id = Uuid::new_v4();
            for (index, edge_id) in edge_ids.iter().enumerate() {
                let owner: Option<Uuid> =
                    sqlx::query_scalar("SELECT graph_id FROM graph_edges WHERE edge_id = ?")
                        .bind(edge_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if owner != Some(graph_id) {
                    return Err(StoreError::NotFound(format!(
                        "edge {edge_id} not found in graph {graph_id}"
                    )));
                }

                sqlx::query(
                    "INSERT INTO route_steps (route_id, step_index, edge_id) VALUES (?, ?, ?)",
                )
                .bind(route_id)
                .bind(index as i64)
                .bind(edge_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(route_id)
        }

        async fn get_route(&self, route_id: Uuid) -> StoreResult<Vec<EdgeRow>> {
            let rows = sqlx::query_as::<_, EdgeRow>(
                "SELECT e.* FROM route_steps rs
                 JOIN graph_edges e ON e.edge_id = rs.edge_id
                 WHERE rs.route_id = ?
                 ORDER BY rs.step_index",
            )
            .bind(route_id)
            .fetch_all(&self.pool)
            .await?;
            if rows.is_empty() {
                return Err(StoreError::NotFound(format!("route {route_id} not found")));
            }
            Ok(rows)
        }
    }

    /// Sweep candidate query: nothing reaches the fingerprint anymore.
    const ORPHAN_SELECT_SQL: &str = "
        SELECT * FROM fingerprints f
        WHERE f.created_at < ?
          AND NOT EXISTS (SELECT 1 FROM datasets d WHERE d.ingestion_fingerprint_id = f.fingerprint_id)
          AND NOT EXISTS (SELECT 1 FROM analysis_links l WHERE l.analysis_fingerprint_id = f.fingerprint_id)
          AND NOT EXISTS (SELECT 1 FROM graphs g WHERE g.build_fingerprint_id = f.fingerprint_id)
        ORDER BY f.created_at
        LIMIT ?";

    #[async_trait]
    impl SweepRepo for SqliteStore {
        async fn find_orphaned_fingerprints(
            &self,
            older_than: OffsetDateTime,
            limit: u32,
        ) -> StoreResult<Vec<FingerprintRow>> {
            let rows = sqlx::query_as::<_, FingerprintRow>(ORPHAN_SELECT_SQL)
                .bind(older_than)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn sweep_orphans(
            &self,
            older_than: OffsetDateTime,
            limit: u32,
        ) -> StoreResult<SweepStats> {
            let mut tx = self.pool.begin().await?;

            let candidates = sqlx::query_as::<_, FingerprintRow>(ORPHAN_SELECT_SQL)
                .bind(older_than)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await?;

            let mut stats = SweepStats {
                fingerprints_examined: candidates.len() as u64,
                ..SweepStats::default()
            };
            let mut cascade = CascadeStats::default();

            for candidate in &candidates {
                // A clustering candidate's cascade removes the build
                // fingerprints of its graphs, which may also be in this
                // batch; skip anything already gone.
                let still_there: Option<i32> =
                    sqlx::query_scalar("SELECT 1 FROM fingerprints WHERE fingerprint_id = ?")
                        .bind(candidate.fingerprint_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if still_there.is_none() {
                    continue;
                }

                let mut one = CascadeStats::default();
                cascade_fingerprint(&mut tx, candidate.fingerprint_id, &mut one).await?;
                cascade.absorb(&one);
                stats.fingerprints_deleted += 1;
            }

            tx.commit().await?;

            stats.rows_deleted = cascade.total_rows();
            if stats.fingerprints_deleted > 0 {
                tracing::info!(
                    examined = stats.fingerprints_examined,
                    deleted = stats.fingerprints_deleted,
                    rows = stats.rows_deleted,
                    "orphan sweep completed"
                );
            }
            Ok(stats)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Fingerprints: content-addressed roots of every cached subtree
CREATE TABLE IF NOT EXISTS fingerprints (
    fingerprint_id BLOB PRIMARY KEY,
    hash_value TEXT NOT NULL UNIQUE,
    state TEXT NOT NULL DEFAULT 'pending',
    params TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_fingerprints_state ON fingerprints(state, created_at);

-- Users
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Datasets, rooted at their ingestion fingerprint
CREATE TABLE IF NOT EXISTS datasets (
    dataset_id BLOB PRIMARY KEY,
    dataset_name TEXT NOT NULL UNIQUE,
    owner_user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    ingestion_fingerprint_id BLOB NOT NULL REFERENCES fingerprints(fingerprint_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_datasets_owner ON datasets(owner_user_id);
CREATE INDEX IF NOT EXISTS idx_datasets_fingerprint ON datasets(ingestion_fingerprint_id);

-- Dataset / analysis-fingerprint association
CREATE TABLE IF NOT EXISTS analysis_links (
    dataset_id BLOB NOT NULL REFERENCES datasets(dataset_id) ON DELETE CASCADE,
    analysis_fingerprint_id BLOB NOT NULL REFERENCES fingerprints(fingerprint_id) ON DELETE CASCADE,
    PRIMARY KEY (dataset_id, analysis_fingerprint_id)
);
CREATE INDEX IF NOT EXISTS idx_analysis_links_fingerprint ON analysis_links(analysis_fingerprint_id);

-- Normalized trajectory points
CREATE TABLE IF NOT EXISTS positions (
    position_id BLOB PRIMARY KEY,
    fingerprint_id BLOB NOT NULL REFERENCES fingerprints(fingerprint_id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    speed REAL,
    course REAL
);
CREATE INDEX IF NOT EXISTS idx_positions_fingerprint ON positions(fingerprint_id);

-- Cluster artifacts, keyed by (fingerprint, cluster number)
CREATE TABLE IF NOT EXISTS clusters (
    fingerprint_id BLOB NOT NULL REFERENCES fingerprints(fingerprint_id) ON DELETE CASCADE,
    cluster_num INTEGER NOT NULL,
    PRIMARY KEY (fingerprint_id, cluster_num)
);

CREATE TABLE IF NOT EXISTS cluster_members (
    fingerprint_id BLOB NOT NULL,
    cluster_num INTEGER NOT NULL,
    position_id BLOB NOT NULL REFERENCES positions(position_id) ON DELETE CASCADE,
    PRIMARY KEY (fingerprint_id, cluster_num, position_id),
    FOREIGN KEY (fingerprint_id, cluster_num) REFERENCES clusters(fingerprint_id, cluster_num) ON DELETE CASCADE
);
-- A position belongs to at most one cluster per fingerprint.
CREATE UNIQUE INDEX IF NOT EXISTS idx_cluster_members_position ON cluster_members(fingerprint_id, position_id);

CREATE TABLE IF NOT EXISTS cluster_stats (
    fingerprint_id BLOB NOT NULL,
    cluster_num INTEGER NOT NULL,
    average_speed REAL,
    average_course REAL,
    PRIMARY KEY (fingerprint_id, cluster_num),
    FOREIGN KEY (fingerprint_id, cluster_num) REFERENCES clusters(fingerprint_id, cluster_num) ON DELETE CASCADE
);

-- Boundary polygons; point_index carries the winding order
CREATE TABLE IF NOT EXISTS polygon_points (
    fingerprint_id BLOB NOT NULL,
    cluster_num INTEGER NOT NULL,
    point_index INTEGER NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    PRIMARY KEY (fingerprint_id, cluster_num, point_index),
    FOREIGN KEY (fingerprint_id, cluster_num) REFERENCES clusters(fingerprint_id, cluster_num) ON DELETE CASCADE
);

-- Routing graphs, scoped to one cluster artifact and keyed for reuse by
-- their build fingerprint
CREATE TABLE IF NOT EXISTS graphs (
    graph_id BLOB PRIMARY KEY,
    build_fingerprint_id BLOB NOT NULL UNIQUE REFERENCES fingerprints(fingerprint_id) ON DELETE CASCADE,
    fingerprint_id BLOB NOT NULL,
    cluster_num INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (fingerprint_id, cluster_num) REFERENCES clusters(fingerprint_id, cluster_num) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_graphs_cluster ON graphs(fingerprint_id, cluster_num);

CREATE TABLE IF NOT EXISTS graph_vertices (
    vertex_id BLOB PRIMARY KEY,
    graph_id BLOB NOT NULL REFERENCES graphs(graph_id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_graph_vertices_graph ON graph_vertices(graph_id);

-- Directed weighted edges; no uniqueness on (start, end), self-loops and
-- parallel edges are the producer's call
CREATE TABLE IF NOT EXISTS graph_edges (
    edge_id BLOB PRIMARY KEY,
    graph_id BLOB NOT NULL REFERENCES graphs(graph_id) ON DELETE CASCADE,
    start_vertex_id BLOB NOT NULL REFERENCES graph_vertices(vertex_id) ON DELETE CASCADE,
    end_vertex_id BLOB NOT NULL REFERENCES graph_vertices(vertex_id) ON DELETE CASCADE,
    weight REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_graph_edges_graph ON graph_edges(graph_id);

-- Computed routes as ordered edge sequences
CREATE TABLE IF NOT EXISTS route_steps (
    route_id BLOB NOT NULL,
    step_index INTEGER NOT NULL,
    edge_id BLOB NOT NULL REFERENCES graph_edges(edge_id) ON DELETE CASCADE,
    PRIMARY KEY (route_id, step_index)
);
CREATE INDEX IF NOT EXISTS idx_route_steps_edge ON route_steps(edge_id);
"#;
