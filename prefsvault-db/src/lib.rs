//! Minimal safe `SQLite` wrapper backed by `sqlite3mc`.
//!
//! The raw symbols come from the `sqlite3mc` static library that `build.rs`
//! compiles from the pinned amalgamation. Everything above the `ffi` module is safe
//! Rust: connections, prepared statements and the per-connection statement
//! cache, transactions, and the [`cipher`] helpers that key a file and set
//! its durability pragmas.

mod ffi;

mod cache;
mod connection;
pub mod error;
mod statement;
mod transaction;
pub mod value;

pub mod cipher;

pub use cache::{CacheStats, CachedStatement};
pub use cipher::CipherConfig;
pub use connection::Connection;
pub use error::{DbError, DbErrorCode, DbResult};
pub use statement::{Statement, StepResult};
pub use transaction::{Transaction, TransactionBehavior};
pub use value::Value;

#[cfg(test)]
mod tests;
