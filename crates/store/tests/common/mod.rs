//! Shared test harness.

pub mod fixtures;

use fairway_store::{SqliteStore, StoreResult, TrajectoryStore};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tempfile::TempDir;

/// A test artifact store backed by a temporary SQLite file.
#[allow(dead_code)]
pub struct TestStore {
    pub store: Arc<dyn TrajectoryStore>,
    sqlite_store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestStore {
    pub async fn new() -> StoreResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(&db_path, None).await?;
        let arc_store = Arc::new(store);

        Ok(Self {
            store: arc_store.clone(),
            sqlite_store: arc_store,
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn TrajectoryStore> {
        self.store.clone()
    }

    /// Raw pool access for invariant scans.
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }
}
