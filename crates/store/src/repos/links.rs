//! Dataset / analysis-fingerprint link repository.

use crate::error::StoreResult;
use crate::models::FingerprintRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for the many-to-many association between datasets and the
/// analysis fingerprints computed against them.
#[async_trait]
pub trait AnalysisLinkRepo: Send + Sync {
    /// Link a dataset to an analysis fingerprint. Idempotent: linking an
    /// already-linked pair is a no-op.
    async fn link_analysis(
        &self,
        dataset_id: Uuid,
        analysis_fingerprint_id: Uuid,
    ) -> StoreResult<()>;

    /// Remove the link row only; neither side's subtree is touched.
    async fn unlink_analysis(
        &self,
        dataset_id: Uuid,
        analysis_fingerprint_id: Uuid,
    ) -> StoreResult<()>;

    /// All analysis fingerprints linked to a dataset.
    async fn list_analyses(&self, dataset_id: Uuid) -> StoreResult<Vec<FingerprintRow>>;

    /// Number of datasets linked to an analysis fingerprint.
    async fn count_links(&self, analysis_fingerprint_id: Uuid) -> StoreResult<u64>;
}
