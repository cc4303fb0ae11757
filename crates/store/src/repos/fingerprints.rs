//! Fingerprint repository.

use crate::error::StoreResult;
use crate::models::{CascadeStats, FingerprintRow};
use async_trait::async_trait;
use fairway_core::{CacheOutcome, ParamSet, ParamsDigest};
use uuid::Uuid;

/// Repository for content-addressed fingerprints.
#[async_trait]
pub trait FingerprintRepo: Send + Sync {
    /// Resolve a parameter set to its fingerprint.
    ///
    /// On a cache hit the existing row is returned unchanged. On a miss a
    /// `pending` row is created with the current timestamp and the canonical
    /// parameter payload, and `CacheOutcome::Miss` tells the caller to run
    /// the underlying computation. Safe under concurrent resolves for the
    /// same digest: at most one row is ever created, the losing writer
    /// re-reads and returns the winner's row.
    async fn resolve(&self, params: &ParamSet) -> StoreResult<(FingerprintRow, CacheOutcome)>;

    /// Look up a fingerprint by its digest.
    async fn get_by_hash(&self, digest: &ParamsDigest) -> StoreResult<Option<FingerprintRow>>;

    /// Look up a fingerprint by id.
    async fn get_fingerprint(&self, fingerprint_id: Uuid) -> StoreResult<Option<FingerprintRow>>;

    /// Delete a fingerprint and, transitively and atomically, every row
    /// rooted at it. Fails with `NotFound` if the id does not exist.
    async fn delete_fingerprint(&self, fingerprint_id: Uuid) -> StoreResult<CascadeStats>;
}
