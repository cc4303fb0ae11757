//! Position repository.

use crate::error::StoreResult;
use crate::models::{NewPosition, PositionRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for normalized trajectory points.
#[async_trait]
pub trait PositionRepo: Send + Sync {
    /// Bulk-insert the positions an ingestion run produced, atomically, and
    /// transition the fingerprint to `ready`.
    ///
    /// Fails with `NotFound` if the fingerprint is absent and `Conflict` if
    /// its positions were already recorded (cache entries are write-once).
    /// Returns the assigned position ids in input order.
    async fn insert_positions(
        &self,
        fingerprint_id: Uuid,
        positions: &[NewPosition],
    ) -> StoreResult<Vec<Uuid>>;

    /// Read all positions of a fingerprint.
    async fn get_positions(&self, fingerprint_id: Uuid) -> StoreResult<Vec<PositionRow>>;

    /// Count positions of a fingerprint.
    async fn count_positions(&self, fingerprint_id: Uuid) -> StoreResult<u64>;
}
