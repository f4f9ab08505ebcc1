//! Owner of the single connection to the encrypted settings file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use prefsvault_db::{cipher, CipherConfig, Connection};
use secrecy::{ExposeSecret, SecretString};

use super::paths::{database_files, ensure_dir, StoragePaths};
use super::schema::{ensure_schema, migrate_schema_version, update_schema};
use crate::error::{StoreError, StoreResult};
use crate::types::HandleState;

#[derive(Debug)]
struct HandleInner {
    state: HandleState,
    conn: Option<Connection>,
    db_path: Option<PathBuf>,
}

/// Opens, hands out and closes the one handle to the settings database.
///
/// A `HandleManager` is created once by whoever owns the file and passed by
/// reference to everything that needs the handle. Each operation holds the
/// manager's lock for its whole duration, so operations never interleave.
#[derive(Debug)]
pub struct HandleManager {
    inner: Mutex<HandleInner>,
}

impl Default for HandleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleManager {
    /// A manager with no handle, in [`HandleState::Unopened`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(HandleInner {
                state: HandleState::Unopened,
                conn: None,
                db_path: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleInner> {
        // A panicking operation leaves the handle itself consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.lock().state
    }

    /// Path of the database file, once `initialize` has derived one.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.lock().db_path.clone()
    }

    /// Opens `<config_dir>/sql/db.sqlite` under encryption and publishes
    /// the handle.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyInitialized`] while a handle is open.
    /// - [`StoreError::InvalidArgument`] for an empty `config_dir` or key.
    /// - [`StoreError::InvalidKey`] if the key has characters outside
    ///   `[0-9A-Za-z]`.
    /// - [`StoreError::StorageOpen`] if creating the directory, opening,
    ///   keying, configuring or migrating the file fails. The partially
    ///   opened file is closed first.
    pub fn initialize(&self, config_dir: &Path, key: &SecretString) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.conn.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        if config_dir.as_os_str().is_empty() {
            return Err(StoreError::InvalidArgument(
                "configDir must not be empty".to_string(),
            ));
        }
        validate_key(key.expose_secret())?;

        inner.state = HandleState::Opening;
        let paths = StoragePaths::new(config_dir);
        let db_path = paths.db_path();
        inner.db_path = Some(db_path.clone());

        match open_database(&paths, key) {
            Ok(conn) => {
                log::info!("opened settings database at {}", db_path.display());
                inner.conn = Some(conn);
                inner.state = HandleState::Open;
                Ok(())
            }
            Err(err) => {
                log::error!("failed to open settings database: {err}");
                inner.state = HandleState::Closed;
                Err(err)
            }
        }
    }

    /// Optimizes and closes the handle. Without an open handle this does
    /// nothing.
    ///
    /// The handle is released even when the engine reports an error on
    /// close; that error is returned as [`StoreError::Database`].
    pub fn close(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        close_handle(&mut inner)
    }

    /// Closes the handle if open (without optimizing), then deletes the database file with its
    /// `-wal` and `-shm` side files.
    ///
    /// A failed close is logged and does not stop the deletion. Files that
    /// are already gone are skipped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoFilePathKnown`] if `initialize` never ran.
    /// - [`StoreError::Io`] if a file exists and cannot be removed.
    pub fn remove_db(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        if let Err(err) = close_connection(&mut inner) {
            log::warn!("removeDB: close failed, deleting files anyway: {err}");
        }
        let db_path = inner.db_path.clone().ok_or(StoreError::NoFilePathKnown)?;

        for file in database_files(&db_path) {
            match std::fs::remove_file(&file) {
                Ok(()) => log::debug!("removeDB: deleted {}", file.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StoreError::Io(format!(
                        "failed to delete {}: {err}",
                        file.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Runs `f` against the open handle (`getInstance`).
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] when no handle is open, otherwise
    /// whatever `f` returns.
    pub fn with_instance<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let inner = self.lock();
        let conn = inner.conn.as_ref().ok_or(StoreError::NotInitialized)?;
        f(conn)
    }
}

/// Accepts only non-empty ASCII alphanumeric keys; the key is spliced into
/// a quoted `PRAGMA key` directive.
fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument(
            "key must not be empty".to_string(),
        ));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StoreError::InvalidKey);
    }
    Ok(())
}

fn open_database(paths: &StoragePaths, key: &SecretString) -> StoreResult<Connection> {
    ensure_dir(paths.sql_dir()).map_err(|e| {
        StoreError::StorageOpen(format!(
            "failed to create {}: {e}",
            paths.sql_dir().display()
        ))
    })?;

    let conn = Connection::open(&paths.db_path(), false)
        .map_err(|e| StoreError::StorageOpen(e.to_string()))?;

    if let Err(err) = configure(&conn, key) {
        if let Err(close_err) = conn.close() {
            log::warn!("failed to close partially opened database: {close_err}");
        }
        return Err(match err {
            StoreError::StorageOpen(_) => err,
            other => StoreError::StorageOpen(other.to_string()),
        });
    }
    Ok(conn)
}

fn configure(conn: &Connection, key: &SecretString) -> StoreResult<()> {
    cipher::apply_key(conn, CipherConfig::SQLCIPHER_V4, key.expose_secret())
        .map_err(|e| StoreError::StorageOpen(e.to_string()))?;
    cipher::configure_durability(conn).map_err(|e| StoreError::StorageOpen(e.to_string()))?;
    migrate_schema_version(conn)?;
    update_schema(conn)?;
    ensure_schema(conn)?;
    cipher::enable_foreign_keys(conn).map_err(|e| StoreError::StorageOpen(e.to_string()))?;
    let ok = cipher::integrity_check(conn).map_err(|e| StoreError::StorageOpen(e.to_string()))?;
    if !ok {
        return Err(StoreError::StorageOpen(
            "integrity check failed".to_string(),
        ));
    }
    Ok(())
}

/// Optimizes, then closes. Used when the file stays on disk.
fn close_handle(inner: &mut HandleInner) -> StoreResult<()> {
    if let Some(conn) = inner.conn.as_ref() {
        match cipher::optimize(conn) {
            Ok(()) => log::debug!("optimized settings database"),
            Err(err) => log::warn!("optimize before close failed: {err}"),
        }
    }
    close_connection(inner)
}

fn close_connection(inner: &mut HandleInner) -> StoreResult<()> {
    let Some(conn) = inner.conn.take() else {
        return Ok(());
    };
    inner.state = HandleState::Closed;
    conn.close().map_err(|e| StoreError::database(&e))?;
    log::info!("closed settings database");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("abc123" ; "lowercase and digits")]
    #[test_case("ABCxyz789" ; "mixed case")]
    #[test_case("0" ; "single digit")]
    fn test_valid_keys(key: &str) {
        assert_eq!(validate_key(key), Ok(()));
    }

    #[test_case("with space" ; "space")]
    #[test_case("quote'd" ; "single quote")]
    #[test_case("semi;colon" ; "semicolon")]
    #[test_case("dash-ed" ; "dash")]
    #[test_case("ümlaut" ; "non ascii letter")]
    fn test_invalid_keys(key: &str) {
        assert_eq!(validate_key(key), Err(StoreError::InvalidKey));
    }

    #[test]
    fn test_empty_key_is_invalid_argument() {
        assert!(matches!(
            validate_key(""),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
