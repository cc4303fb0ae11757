//! Artifact store error types.

use thiserror::Error;

/// Artifact store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Domain(#[from] fairway_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether a database error is a unique-constraint violation.
    ///
    /// Used by the resolve retry loop: the losing writer of a digest race
    /// sees this and re-reads the winner's row instead of surfacing it.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err)
            if db_err.message().contains("UNIQUE constraint"))
    }
}

/// Result type for artifact store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
