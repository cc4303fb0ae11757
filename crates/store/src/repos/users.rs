//! User repository.

use crate::error::StoreResult;
use crate::models::{CascadeStats, UserRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `AlreadyExists` on a taken username.
    async fn create_user(&self, user: &UserRow) -> StoreResult<()>;

    /// Get a user by id.
    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<UserRow>>;

    /// Get a user by username.
    async fn get_user_by_name(&self, username: &str) -> StoreResult<Option<UserRow>>;

    /// Delete a user and all datasets it owns, cascading each dataset's
    /// ingestion subtree. Analysis fingerprints still linked from another
    /// user's dataset are left untouched.
    async fn delete_user(&self, user_id: Uuid) -> StoreResult<CascadeStats>;
}
