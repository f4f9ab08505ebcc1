//! Error type for the safe `SQLite` wrapper.

use std::fmt;

use thiserror::Error;

/// Result code returned by an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbErrorCode(pub i32);

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sqlite error {code}: {message}")]
pub struct DbError {
    /// `SQLite` result code.
    pub code: DbErrorCode,
    /// Human-readable message, from `sqlite3_errmsg` when available.
    pub message: String,
}

impl DbError {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: DbErrorCode(code),
            message: message.into(),
        }
    }

    /// `true` when a query that must yield a row yielded none.
    #[must_use]
    pub const fn is_no_rows(&self) -> bool {
        self.code.0 == crate::ffi::SQLITE_DONE
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
