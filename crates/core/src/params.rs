//! Normalized analysis parameter sets.
//!
//! Every analysis run (ingestion, clustering, graph build) is identified by
//! the digest of its normalized parameter payload. Normalization means a
//! canonical encoding: keys sorted, scalar values only, and a `kind` tag so
//! parameter sets of different analysis kinds can never collide.

use crate::hash::ParamsDigest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A scalar parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A normalized key-value parameter payload.
///
/// Backed by a `BTreeMap` so the JSON encoding is canonical: the same
/// logical parameters always serialize to the same bytes regardless of
/// insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a parameter value.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical JSON encoding (sorted keys, scalar values).
    pub fn canonical_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Digest of the canonical encoding. This is the cache key.
    pub fn digest(&self) -> crate::Result<ParamsDigest> {
        Ok(ParamsDigest::compute(&self.canonical_json()?))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parameters of a dataset ingestion run.
///
/// The digest of the raw uploaded files is part of the payload, so the same
/// files normalized with the same settings resolve to the existing
/// fingerprint while a changed source produces a new one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionParams {
    /// Hex digest of the raw trajectory input.
    pub source_digest: String,
    /// Whether gaps between points are interpolated.
    pub interpolation: bool,
    /// Largest gap, in minutes, that interpolation may bridge.
    pub max_gap_minutes: f64,
}

impl IngestionParams {
    /// Normalize into the canonical payload.
    pub fn to_param_set(&self) -> ParamSet {
        ParamSet::new()
            .with("kind", "ingestion")
            .with("source_digest", self.source_digest.as_str())
            .with("interpolation", self.interpolation)
            .with("max_gap_minutes", self.max_gap_minutes)
    }
}

/// Parameters of a clustering run over one dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusteringParams {
    /// The dataset the clustering was computed against.
    pub dataset_id: Uuid,
    /// Neighborhood radius.
    pub eps: f64,
    /// Minimum neighborhood size.
    pub min_points: i64,
    /// Algorithm-specific extras forwarded from the caller.
    #[serde(default)]
    pub extra: ParamSet,
}

impl ClusteringParams {
    /// Normalize into the canonical payload.
    pub fn to_param_set(&self) -> ParamSet {
        let mut params = ParamSet::new()
            .with("kind", "clustering")
            .with("dataset_id", self.dataset_id.to_string())
            .with("eps", self.eps)
            .with("min_points", self.min_points);
        for (key, value) in &self.extra.0 {
            params.set(format!("extra.{key}"), value.clone());
        }
        params
    }
}

/// Parameters of a routing-graph build and pathfinding run.
///
/// The clustering digest is part of the payload: the same graph settings
/// against a different clustering run must produce a different fingerprint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphParams {
    /// Digest of the clustering run the graph is scoped to.
    pub clustering_digest: ParamsDigest,
    /// The cluster the graph is built over.
    pub cluster_num: i64,
    /// Pathfinding algorithm selector.
    pub search_algorithm: String,
    /// Whether interior points participate in graph construction.
    pub points_inside: bool,
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    /// Algorithm-specific extras forwarded from the caller.
    #[serde(default)]
    pub extra: ParamSet,
}

impl GraphParams {
    /// Normalize into the canonical payload.
    pub fn to_param_set(&self) -> ParamSet {
        let mut params = ParamSet::new()
            .with("kind", "graph")
            .with("clustering_digest", self.clustering_digest.to_hex())
            .with("cluster_num", self.cluster_num)
            .with("search_algorithm", self.search_algorithm.as_str())
            .with("points_inside", self.points_inside)
            .with("start_lat", self.start_lat)
            .with("start_lon", self.start_lon)
            .with("end_lat", self.end_lat)
            .with("end_lon", self.end_lon);
        for (key, value) in &self.extra.0 {
            params.set(format!("extra.{key}"), value.clone());
        }
        params
    }
}
