use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Decides whether a raw driver error is an integrity-constraint violation.
/// Swappable per database driver via [`crate::Store::with_classifier`].
pub type IntegrityClassifier = fn(&rusqlite::Error) -> bool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching row")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("batch insert built {actual} placeholders, expected {expected}")]
    PlaceholderMismatch { expected: usize, actual: usize },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// SQLite reports every integrity rule (UNIQUE, PRIMARY KEY, NOT NULL, CHECK,
/// FOREIGN KEY) under the `SQLITE_CONSTRAINT` primary code.
pub fn is_integrity_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

pub(crate) fn is_interrupt(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted
    )
}

/// Maps "no rows" results to [`StoreError::NotFound`], passing every other
/// driver error through unchanged.
pub(crate) trait NotFoundExt<T> {
    fn or_not_found(self) -> Result<T>;
}

impl<T> NotFoundExt<T> for std::result::Result<T, rusqlite::Error> {
    fn or_not_found(self) -> Result<T> {
        match self {
            Ok(val) => Ok(val),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
