//! Fingerprint identity and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a fingerprint row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintId(Uuid);

impl FingerprintId {
    /// Generate a new random fingerprint ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidParams(format!("invalid fingerprint ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FingerprintId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FingerprintId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FingerprintId({})", self.0)
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint lifecycle state.
///
/// A fingerprint is created `Pending` on the first cache miss for its digest
/// and becomes `Ready` once the analysis artifacts are recorded. Deletion is
/// terminal and removes the row, so it has no variant here: a digest with no
/// row is simply absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintState {
    /// Created, computation not yet recorded. Eligible for the orphan sweep.
    Pending,
    /// Artifacts stored; the subtree is immutable from here on.
    Ready,
}

impl FingerprintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
        }
    }

    /// Parse from the stored column value.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            other => Err(crate::Error::InvalidParams(format!(
                "unknown fingerprint state: {other}"
            ))),
        }
    }

    /// Check whether artifacts may still be recorded under this fingerprint.
    pub fn accepts_artifacts(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Validate a transition; the only legal one is pending -> ready.
    pub fn transition_to(self, next: Self) -> crate::Result<Self> {
        match (self, next) {
            (Self::Pending, Self::Ready) => Ok(next),
            (from, to) => Err(crate::Error::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }),
        }
    }
}

/// Whether a resolve landed on an existing fingerprint or created one.
///
/// `Miss` tells the caller to run the underlying computation and record its
/// artifacts; `Hit` means the cached subtree can be read directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}
