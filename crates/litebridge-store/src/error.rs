//! Error types for the litebridge-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! The adapter never wraps or retries engine errors; instead it exposes
//! classification predicates ([`StoreError::is_transient`],
//! [`StoreError::is_unique_violation`]) so callers can decide.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    ///
    /// Raised before any SQL is issued (empty identifiers, negative
    /// paging counts, and the like).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An insert completed without producing a generated key.
    #[error("insert produced no generated key: {0}")]
    NoGeneratedKey(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// Filesystem inspection failed (database file size).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error is a retry-safe transient engine condition.
    ///
    /// True iff the engine reported busy or locked — the conditions a
    /// `busy_timeout` expiry surfaces as. Everything else, including
    /// non-engine errors, is non-transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.sqlite_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    /// Whether this error is a uniqueness/constraint violation.
    ///
    /// True iff the underlying engine failure carries primary result
    /// code 19 (`SQLITE_CONSTRAINT`). A missing or non-engine cause is
    /// never a uniqueness violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.sqlite_code(), Some(ErrorCode::ConstraintViolation))
    }

    /// Primary SQLite result code of the underlying engine failure, if any.
    fn sqlite_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Sqlite(err) => err.sqlite_error_code(),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn constraint_error() -> StoreError {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();
        StoreError::from(err)
    }

    #[test]
    fn constraint_code_classifies_as_unique_violation() {
        let err = constraint_error();
        assert!(err.is_unique_violation());
        assert!(!err.is_transient());
    }

    #[test]
    fn non_engine_errors_classify_as_neither() {
        let err = StoreError::InvalidArgument("nope".into());
        assert!(!err.is_unique_violation());
        assert!(!err.is_transient());

        let err = StoreError::TaskJoin("cancelled".into());
        assert!(!err.is_unique_violation());
        assert!(!err.is_transient());
    }

    #[test]
    fn syntax_errors_are_not_transient() {
        let conn = Connection::open_in_memory().unwrap();
        let err = StoreError::from(conn.execute("NOT SQL", []).unwrap_err());
        assert!(!err.is_transient());
        assert!(!err.is_unique_violation());
    }
}
