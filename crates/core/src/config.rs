//! Configuration types shared across crates.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifact store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Advisory query timeout in seconds.
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            query_timeout_secs: None,
        }
    }
}

/// Orphan sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Grace period in seconds before an unreferenced fingerprint becomes
    /// eligible for reclamation. Protects fingerprints resolved just before
    /// their artifacts or links are recorded.
    #[serde(default = "default_sweep_grace_secs")]
    pub grace_secs: u64,
    /// Maximum fingerprints reclaimed per sweep pass.
    #[serde(default = "default_sweep_batch_limit")]
    pub batch_limit: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_sweep_grace_secs(),
            batch_limit: default_sweep_batch_limit(),
        }
    }
}

impl SweepConfig {
    /// Grace period as a Duration.
    pub fn grace(&self) -> time::Duration {
        let secs = i64::try_from(self.grace_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }
}

/// Default clustering parameters offered to new sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusteringDefaults {
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_min_points")]
    pub min_points: i64,
}

impl Default for ClusteringDefaults {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_points: default_min_points(),
        }
    }
}

/// Default graph-build parameters offered to new sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphDefaults {
    #[serde(default = "default_search_algorithm")]
    pub search_algorithm: String,
    #[serde(default = "default_points_inside")]
    pub points_inside: bool,
}

impl Default for GraphDefaults {
    fn default() -> Self {
        Self {
            search_algorithm: default_search_algorithm(),
            points_inside: default_points_inside(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub clustering: ClusteringDefaults,
    #[serde(default)]
    pub graph: GraphDefaults,
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus `FAIRWAY_`-prefixed
    /// environment variables; the file is optional, env vars can provide or
    /// override everything.
    pub fn load(config_path: Option<&Path>) -> crate::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = config_path
            && path.exists()
        {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("FAIRWAY_").split("__"))
            .extract()
            .map_err(|e| crate::Error::Config(e.to_string()))
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fairway.db")
}

fn default_sweep_grace_secs() -> u64 {
    3600 // 1 hour
}

fn default_sweep_batch_limit() -> u32 {
    256
}

fn default_eps() -> f64 {
    0.5
}

fn default_min_points() -> i64 {
    5
}

fn default_search_algorithm() -> String {
    "astar".to_string()
}

fn default_points_inside() -> bool {
    false
}
