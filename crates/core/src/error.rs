//! Deterministic business failures.
//!
//! Everything in here is a *decision*, not an accident: given the same
//! aggregate state and command, the same variant comes back. Infrastructure
//! failures (storage, transport) live in their own layers.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed a validation gate (empty SKU, negative threshold, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command would break a domain invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The target aggregate has no history.
    #[error("not found")]
    NotFound,

    /// The command collides with existing state (duplicate create, re-void).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
