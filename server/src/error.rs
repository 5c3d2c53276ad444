//! Authorization Error Types
//!
//! Engines return [`AuthzError`] as a typed outcome so callers can map each
//! class to a distinct response without inspecting message text. Services wrap
//! it in [`ServiceError`] together with infrastructure failures.

use uuid::Uuid;

use crate::store::StoreError;

/// Outcome of a rejected authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The target record does not exist (or is not active).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The actor lacks the standing required for the operation.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// A state prerequisite does not hold (last owner, wrong access level, ...).
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AuthzError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn not_authorized(reason: impl Into<String>) -> Self {
        Self::NotAuthorized(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// Human-readable reason without the class prefix.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::NotFound(r) | Self::NotAuthorized(r) | Self::Conflict(r) => r,
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors surfaced by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Optimistic concurrency retries were exhausted for one aggregate.
    #[error("Too many concurrent modifications to {0}")]
    Contention(Uuid),
}

impl ServiceError {
    /// Whether the failure is an infrastructure problem rather than a decision.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::Authz(_))
    }
}
