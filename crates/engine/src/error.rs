//! The module contains the error the engine can throw.
//!
//! Every public operation returns [`EngineError`]. Callers that only need to
//! branch on the failure class (the HTTP layer, for instance) use
//! [`EngineError::kind`].
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or semantically invalid input.
    #[error("{0}")]
    Validation(String),
    /// The resource exists but is not owned by the caller (or the caller
    /// must not learn whether it exists).
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsufficientBalance(String),
    #[error("{0}")]
    Conflict(String),
    /// A write failed after validation passed.
    #[error("{0}")]
    Persistence(String),
    /// A compare-and-set balance write found a different balance than the one
    /// read. Retried by the engine, surfaced as [`EngineError::Conflict`] when
    /// attempts run out.
    #[error("stale balance for account {0}")]
    StaleBalance(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Failure classes of [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    InsufficientBalance,
    Conflict,
    Persistence,
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::Conflict(_) | Self::StaleBalance(_) => ErrorKind::Conflict,
            Self::Persistence(_) | Self::Database(_) => ErrorKind::Persistence,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InsufficientBalance(a), Self::InsufficientBalance(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Persistence(a), Self::Persistence(b)) => a == b,
            (Self::StaleBalance(a), Self::StaleBalance(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
