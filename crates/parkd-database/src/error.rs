//! Database error types.

use thiserror::Error;

/// Database error type.
///
/// Domain precondition failures (`NotFound`, `Conflict`, `InvalidInput`)
/// live here because they are detected inside transactional queries and
/// must abort the enclosing transaction.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// State-machine precondition violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or missing input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// True if this is a `Conflict` - the caller may retry after
    /// re-validating preconditions.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// True if this is a `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias using DatabaseError.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
