//! Dataset registry repository.

use crate::error::StoreResult;
use crate::models::{CascadeStats, DatasetRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for the dataset registry.
#[async_trait]
pub trait DatasetRepo: Send + Sync {
    /// Register a dataset. Fails with `AlreadyExists` if the name is taken
    /// and `NotFound` if the ingestion fingerprint or owner is absent.
    async fn create_dataset(&self, dataset: &DatasetRow) -> StoreResult<()>;

    /// Get a dataset by id.
    async fn get_dataset(&self, dataset_id: Uuid) -> StoreResult<Option<DatasetRow>>;

    /// List a user's datasets, ordered by creation then id ascending.
    async fn list_datasets_for_user(&self, user_id: Uuid) -> StoreResult<Vec<DatasetRow>>;

    /// Delete a dataset on behalf of a user.
    ///
    /// Fails with `Forbidden` unless `requesting_user_id` owns the dataset.
    /// Linked analysis fingerprints whose last link this removes, and the
    /// ingestion fingerprint when no other dataset shares it, are cascaded
    /// in the same transaction.
    async fn delete_dataset(
        &self,
        dataset_id: Uuid,
        requesting_user_id: Uuid,
    ) -> StoreResult<CascadeStats>;
}
