//! Version tracking and schema migrations.

use prefsvault_db::{cipher, Connection};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: i64,
    sql: &'static str,
}

const USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
        id      INTEGER PRIMARY KEY,
        theme   TEXT    NOT NULL DEFAULT 'system',
        json    TEXT    NOT NULL
    );";

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: USERS_TABLE,
}];

/// Highest user version this build knows how to produce.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Bridges the legacy `schema_version` counter into `user_version`.
///
/// Once `user_version` is nonzero this is a no-op. A zero `user_version`
/// means the file is brand new or predates version tracking; the legacy
/// counter is then copied over exactly once.
pub fn migrate_schema_version(conn: &Connection) -> StoreResult<()> {
    let user_version = cipher::user_version(conn).map_err(|e| StoreError::database(&e))?;
    if user_version > 0 {
        return Ok(());
    }

    let schema_version = cipher::schema_version(conn).map_err(|e| StoreError::database(&e))?;
    log::info!(
        "migrateSchemaVersion: migrating from schema_version {schema_version} to user_version {schema_version}"
    );
    cipher::set_user_version(conn, schema_version).map_err(|e| StoreError::database(&e))
}

/// Applies every migration newer than the file's `user_version`, each in
/// its own immediate transaction that also stamps the new version.
pub fn update_schema(conn: &Connection) -> StoreResult<()> {
    let current = cipher::user_version(conn).map_err(|e| StoreError::database(&e))?;
    if current > CURRENT_SCHEMA_VERSION {
        log::warn!(
            "update_schema: user_version {current} is newer than this build ({CURRENT_SCHEMA_VERSION})"
        );
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn
            .transaction_immediate()
            .map_err(|e| StoreError::database(&e))?;
        tx.execute_batch(migration.sql)
            .map_err(|e| StoreError::database(&e))?;
        cipher::set_user_version(tx.connection(), migration.version)
            .map_err(|e| StoreError::database(&e))?;
        tx.commit().map_err(|e| StoreError::database(&e))?;
        log::info!("update_schema: updated to version {}", migration.version);
    }
    Ok(())
}

/// Creates any baseline table that is still missing.
///
/// A legacy file can carry a `user_version` copied from its old
/// `schema_version` that is already past migrations it never ran, so the
/// tables the data operations need are checked on every open.
pub fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(USERS_TABLE)
        .map_err(|e| StoreError::database(&e))
}
