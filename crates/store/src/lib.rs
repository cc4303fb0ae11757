//! Content-addressed result store for vessel trajectory analyses.
//!
//! This crate provides the persistence layer of Fairway:
//! - Parameter fingerprints and their lifecycle
//! - Users, datasets, and dataset/analysis links
//! - Normalized positions, cluster artifacts, and routing graphs
//! - Transactional cascade deletion and orphan sweeping
//! - Cache-aware ingestion, clustering, and graph flows

pub mod error;
pub mod models;
pub mod pipeline;
pub mod repos;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{SqliteStore, TrajectoryStore};

use fairway_core::config::StoreConfig;
use std::sync::Arc;

/// Create an artifact store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn TrajectoryStore>> {
    let store = SqliteStore::new(&config.path, config.query_timeout_secs).await?;
    Ok(Arc::new(store) as Arc<dyn TrajectoryStore>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairway_core::config::StoreConfig;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("fairway.db");
        let config = StoreConfig {
            path: db_path.clone(),
            query_timeout_secs: None,
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
