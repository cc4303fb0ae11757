//! Orphan sweep repository.

use crate::error::StoreResult;
use crate::models::{FingerprintRow, SweepStats};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for background reclamation of unreachable fingerprints.
///
/// A fingerprint is an orphan when nothing reaches it anymore: no dataset
/// names it as its ingestion source, no analysis link points at it, and no
/// live routing graph was built under it. Pending fingerprints whose
/// computation was aborted before `store` fall out the same way. The
/// `older_than` cutoff is the grace period protecting fingerprints resolved
/// just before their artifacts or links land.
#[async_trait]
pub trait SweepRepo: Send + Sync {
    /// List sweep-eligible fingerprints, oldest first.
    async fn find_orphaned_fingerprints(
        &self,
        older_than: OffsetDateTime,
        limit: u32,
    ) -> StoreResult<Vec<FingerprintRow>>;

    /// Reclaim orphaned fingerprints, cascading each subtree. The whole pass
    /// is one atomic unit.
    async fn sweep_orphans(
        &self,
        older_than: OffsetDateTime,
        limit: u32,
    ) -> StoreResult<SweepStats>;
}
