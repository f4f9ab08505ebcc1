//! sqlite3mc encryption and durability configuration.
//!
//! # Open sequence
//!
//! 1. **Open**: `sqlite3_open_v2` creates or opens the file. Its pages are
//!    opaque until a key is applied.
//! 2. **Select cipher**: `PRAGMA cipher` picks the sqlite3mc cipher scheme
//!    and `PRAGMA legacy` its compatibility level. These are separate
//!    directives from the key so that a file can never be re-keyed under a
//!    cipher it was not created with.
//! 3. **Key**: `PRAGMA key = '<passphrase>'`.
//! 4. **Verify**: a read from `sqlite_master` forces the first page to be
//!    decrypted. A wrong key surfaces here as `SQLITE_NOTADB`.
//! 5. **Durability**: WAL journal, `synchronous = FULL` and `fullfsync = ON`
//!    so a committed write survives power loss.

use std::path::Path;

use zeroize::Zeroizing;

use super::connection::Connection;
use super::error::{DbError, DbResult};

/// Cipher scheme and compatibility level applied before the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherConfig {
    /// Value for `PRAGMA cipher`.
    pub cipher: &'static str,
    /// Value for `PRAGMA legacy`.
    pub legacy: u32,
}

impl CipherConfig {
    /// SQLCipher v4 page format.
    pub const SQLCIPHER_V4: Self = Self {
        cipher: "sqlcipher",
        legacy: 4,
    };
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self::SQLCIPHER_V4
    }
}

/// Opens `path`, keys it and applies the durability settings.
///
/// The connection is dropped (and thereby closed) if any step fails.
pub fn open_encrypted(path: &Path, config: CipherConfig, key: &str) -> DbResult<Connection> {
    let conn = Connection::open(path, false)?;
    apply_key(&conn, config, key)?;
    configure_durability(&conn)?;
    Ok(conn)
}

/// Issues the cipher, legacy and key directives, then verifies the key.
pub fn apply_key(conn: &Connection, config: CipherConfig, key: &str) -> DbResult<()> {
    conn.execute_batch(&format!("PRAGMA cipher = '{}';", config.cipher))?;
    conn.execute_batch(&format!("PRAGMA legacy = {};", config.legacy))?;

    let escaped = Zeroizing::new(key.replace('\'', "''"));
    let pragma = Zeroizing::new(format!("PRAGMA key = '{}';", escaped.as_str()));
    conn.execute_batch_zeroized(&pragma)?;

    conn.execute_batch("SELECT count(*) FROM sqlite_master;")
        .map_err(|e| {
            DbError::new(
                e.code.0,
                format!(
                    "encryption key verification failed (is the key correct?): {}",
                    e.message
                ),
            )
        })
}

/// WAL journal plus full synchronous flushing.
///
/// `fullfsync` only changes behaviour on Apple platforms (`F_FULLFSYNC`);
/// elsewhere `synchronous = FULL` already issues a real fsync per commit.
pub fn configure_durability(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = FULL;
         PRAGMA fullfsync = ON;",
    )
}

/// Turns on foreign-key enforcement for this connection.
pub fn enable_foreign_keys(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

/// Reads `PRAGMA user_version`.
pub fn user_version(conn: &Connection) -> DbResult<i64> {
    conn.query_row("PRAGMA user_version;", &[], |stmt| Ok(stmt.column_i64(0)))
}

/// Writes `PRAGMA user_version`.
pub fn set_user_version(conn: &Connection, version: i64) -> DbResult<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
}

/// Reads `PRAGMA schema_version`, the engine's DDL change counter.
pub fn schema_version(conn: &Connection) -> DbResult<i64> {
    conn.query_row("PRAGMA schema_version;", &[], |stmt| Ok(stmt.column_i64(0)))
}

/// Reads `PRAGMA journal_mode`.
pub fn journal_mode(conn: &Connection) -> DbResult<String> {
    conn.query_row("PRAGMA journal_mode;", &[], |stmt| Ok(stmt.column_text(0)))
}

/// Runs `PRAGMA integrity_check` and reports whether the file is healthy.
pub fn integrity_check(conn: &Connection) -> DbResult<bool> {
    let result = conn.query_row("PRAGMA integrity_check;", &[], |stmt| {
        Ok(stmt.column_text(0))
    })?;
    Ok(result.trim() == "ok")
}

/// Runs `PRAGMA optimize`, meant for just before close.
pub fn optimize(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA optimize;")
}
