//! Engine error types.

use parkd_database::DatabaseError;
use thiserror::Error;

/// Engine error type.
///
/// Persistence and domain precondition errors pass through from the
/// database layer untouched so their messages reach the caller verbatim.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Caller's role does not permit the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl EngineError {
    /// True if the operation hit a state-machine precondition that may
    /// no longer hold on retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_not_found())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::InvalidInput(_)))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
