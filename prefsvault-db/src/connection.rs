//! Safe wrapper around a `SQLite` database connection.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::Path;

use zeroize::Zeroize;

use super::cache::{CacheStats, CachedStatement, StatementCache};
use super::error::{DbError, DbResult};
use super::ffi;
use super::statement::{Statement, StepResult};
use super::transaction::{Transaction, TransactionBehavior};
use super::value::Value;

/// A `SQLite` database connection.
///
/// Closed when dropped, or explicitly via [`Connection::close`] to observe
/// the engine's result. Not `Sync`: callers share it behind a `Mutex`.
pub struct Connection {
    db: *mut c_void,
    cache: StatementCache,
}

// Safety: `Connection` is `Send` but not `Sync`; it may move between threads
// while only one of them touches it at a time.
unsafe impl Send for Connection {}

impl Connection {
    /// Opens (or creates, unless `read_only`) the database at `path`.
    pub fn open(path: &Path, read_only: bool) -> DbResult<Self> {
        let path_str = path.to_string_lossy();
        let c_path = CString::new(path_str.as_bytes())
            .map_err(|e| DbError::new(ffi::SQLITE_ERROR, format!("invalid path: {e}")))?;

        let flags = if read_only {
            ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_FULLMUTEX
        } else {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE | ffi::SQLITE_OPEN_FULLMUTEX
        };

        let mut db: *mut c_void = std::ptr::null_mut();
        let rc =
            unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, std::ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                format!("sqlite3_open_v2 returned {rc}")
            } else {
                let m = Self::errmsg_raw(db);
                unsafe {
                    ffi::sqlite3_close_v2(db);
                }
                m
            };
            return Err(DbError::new(rc, msg));
        }
        log::debug!("opened sqlite connection at {}", path.display());
        Ok(Self {
            db,
            cache: StatementCache::default(),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(Path::new(":memory:"), false)
    }

    // ── execute_batch ───────────────────────────────────────────────────

    /// Executes one or more `;`-separated statements, discarding any rows.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(ffi::SQLITE_ERROR, format!("nul in SQL: {e}")))?;
        self.exec_raw(&c_sql)
    }

    /// Like [`execute_batch`](Self::execute_batch), then wipes the internal
    /// C copy of `sql`. Use for statements carrying key material.
    pub fn execute_batch_zeroized(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql)
            .map_err(|_| DbError::new(ffi::SQLITE_ERROR, "nul in SQL"))?;
        let result = self.exec_raw(&c_sql);
        c_sql.into_bytes_with_nul().zeroize();
        result
    }

    fn exec_raw(&self, c_sql: &CStr) -> DbResult<()> {
        let mut errmsg: *mut c_char = std::ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_exec(
                self.db,
                c_sql.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
                &mut errmsg,
            )
        };
        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                self.errmsg()
            } else {
                let s = unsafe { CStr::from_ptr(errmsg) }
                    .to_string_lossy()
                    .into_owned();
                unsafe {
                    ffi::sqlite3_free(errmsg.cast());
                }
                s
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(())
    }

    // ── prepare ─────────────────────────────────────────────────────────

    /// Compiles a single statement. Not cached.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(ffi::SQLITE_ERROR, format!("nul in SQL: {e}")))?;
        let mut stmt: *mut c_void = std::ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.db,
                c_sql.as_ptr(),
                -1,
                &mut stmt,
                std::ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK || stmt.is_null() {
            let code = if rc == ffi::SQLITE_OK { ffi::SQLITE_MISUSE } else { rc };
            return Err(DbError::new(code, self.errmsg()));
        }
        Ok(unsafe { Statement::from_raw(stmt, self.db) })
    }

    /// Returns the cached statement for `sql`, compiling it on first use.
    ///
    /// The statement goes back into this connection's cache when the guard
    /// is dropped, rewound and with its bindings cleared.
    pub fn prepare_cached(&self, sql: &str) -> DbResult<CachedStatement<'_>> {
        self.cache.checkout(sql, || self.prepare(sql))
    }

    /// Current statement cache counters.
    #[must_use]
    pub fn statement_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── single statement helpers ────────────────────────────────────────

    /// Prepares and runs one statement, returning the number of rows changed.
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        stmt.step()?;
        Ok(self.changes())
    }

    /// Cached variant of [`execute`](Self::execute).
    pub fn execute_cached(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let mut stmt = self.prepare_cached(sql)?;
        stmt.bind_values(params)?;
        stmt.step()?;
        Ok(self.changes())
    }

    /// Runs a query and maps exactly one row; no row is an error.
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement) -> DbResult<T>,
    ) -> DbResult<T> {
        self.query_row_optional(sql, params, mapper)?
            .ok_or_else(|| DbError::new(ffi::SQLITE_DONE, "query returned no rows"))
    }

    /// Runs a query and maps the first row, `Ok(None)` when there is none.
    pub fn query_row_optional<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        match stmt.step()? {
            StepResult::Row => mapper(&stmt).map(Some),
            StepResult::Done => Ok(None),
        }
    }

    /// Cached variant of [`query_row_optional`](Self::query_row_optional).
    pub fn query_row_optional_cached<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let mut stmt = self.prepare_cached(sql)?;
        stmt.bind_values(params)?;
        match stmt.step()? {
            StepResult::Row => mapper(&*stmt).map(Some),
            StepResult::Done => Ok(None),
        }
    }

    // ── transactions ────────────────────────────────────────────────────

    /// Begins a deferred transaction.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    /// Begins an immediate transaction (takes the RESERVED lock right away).
    pub fn transaction_immediate(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, TransactionBehavior::Immediate)
    }

    /// Rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(unsafe { ffi::sqlite3_changes(self.db) }).unwrap_or(0)
    }

    // ── close ───────────────────────────────────────────────────────────

    /// Finalizes cached statements and closes the connection.
    ///
    /// The native handle is released even when an error is returned.
    pub fn close(mut self) -> DbResult<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> DbResult<()> {
        if self.db.is_null() {
            return Ok(());
        }
        self.cache.clear();
        let rc = unsafe { ffi::sqlite3_close_v2(self.db) };
        let result = if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(DbError::new(rc, self.errmsg()))
        };
        self.db = std::ptr::null_mut();
        result
    }

    // ── error helpers ───────────────────────────────────────────────────

    fn errmsg(&self) -> String {
        Self::errmsg_raw(self.db)
    }

    fn errmsg_raw(db: *mut c_void) -> String {
        unsafe {
            let ptr = ffi::sqlite3_errmsg(db);
            if ptr.is_null() {
                "unknown error".to_string()
            } else {
                CStr::from_ptr(ptr.cast::<c_char>())
                    .to_string_lossy()
                    .into_owned()
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &!self.db.is_null())
            .field("statements", &self.cache.stats())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            log::warn!("closing sqlite connection on drop failed: {err}");
        }
    }
}
