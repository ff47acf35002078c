//! Store error taxonomy.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or out-of-range field, or an empty update. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The lookup key matched no row.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(sqlx::Error),

    /// A stored JSON blob or enum column does not decode to its documented shape.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    /// CHECK and NOT NULL violations are caller faults; everything else is a
    /// storage fault carrying the original error.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(
                db_err.kind(),
                ErrorKind::CheckViolation | ErrorKind::NotNullViolation
            ) {
                return Self::Validation(db_err.message().to_string());
            }
        }
        Self::Storage(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(sqlx::Error::Io(err))
    }
}
