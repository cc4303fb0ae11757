//! Core domain types and shared logic for the fairway analysis cache.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Parameter digests and content-addressed fingerprint identity
//! - Normalized analysis parameter sets (ingestion, clustering, graph build)
//! - Fingerprint lifecycle state
//! - The per-session analysis pointer bound between requests
//! - Configuration types

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod params;
pub mod session;

pub use config::{AppConfig, ClusteringDefaults, GraphDefaults, StoreConfig, SweepConfig};
pub use error::{Error, Result};
pub use fingerprint::{CacheOutcome, FingerprintId, FingerprintState};
pub use hash::ParamsDigest;
pub use params::{ClusteringParams, GraphParams, IngestionParams, ParamSet, ParamValue};
pub use session::AnalysisContext;

/// Length of a hex-encoded parameter digest.
pub const DIGEST_HEX_LEN: usize = 64;
