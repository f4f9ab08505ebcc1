//! Error type shared by the access interface and the access proxy.

use prefsvault_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the settings store.
///
/// Every variant is serializable so that a failure raised by the server
/// reaches a proxy caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum StoreError {
    /// A required argument was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The encryption key contains characters outside `[0-9A-Za-z]`.
    #[error("invalid key: only ASCII letters and digits are allowed")]
    InvalidKey,

    /// `initialize` was called while a handle is open.
    #[error("storage already initialized")]
    AlreadyInitialized,

    /// An operation needed an open handle and there is none.
    #[error("storage not initialized")]
    NotInitialized,

    /// A statement failed to compile.
    #[error("query compilation failed: {0}")]
    QueryCompilation(String),

    /// Opening, keying or migrating the file failed.
    #[error("failed to open storage: {0}")]
    StorageOpen(String),

    /// `removeDB` ran before any `initialize` recorded a file path.
    #[error("cannot remove database: no file path known, initialize never ran")]
    NoFilePathKnown,

    /// The engine failed while executing against an open handle.
    #[error("database error: {0}")]
    Database(String),

    /// A filesystem operation on the storage directory failed.
    #[error("io error: {0}")]
    Io(String),

    /// Encoding or decoding a record or a boundary message failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The other side of the process boundary went away.
    #[error("transport error: {0}")]
    Transport(String),

    /// The proxy no longer accepts new operations.
    #[error("storage client is shutting down")]
    ShuttingDown,
}

impl StoreError {
    pub(crate) fn database(err: &DbError) -> Self {
        Self::Database(err.to_string())
    }

    pub(crate) fn compilation(err: &DbError) -> Self {
        Self::QueryCompilation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
