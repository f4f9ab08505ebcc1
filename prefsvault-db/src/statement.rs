//! Safe wrapper around a `SQLite` prepared statement.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

use super::error::{DbError, DbResult};
use super::ffi;
use super::value::Value;

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// A compiled `SQLite` statement.
///
/// Created by [`Connection::prepare`](super::Connection::prepare) or handed
/// out of the statement cache by
/// [`Connection::prepare_cached`](super::Connection::prepare_cached).
/// Finalized when dropped.
pub struct Statement {
    stmt: *mut c_void,
    /// Owning `sqlite3*`, kept for error messages only.
    db: *mut c_void,
}

// Safety: a statement is only reachable through its owning `Connection`
// (directly or via its cache), which is `Send` but not `Sync`.
unsafe impl Send for Statement {}

impl Statement {
    /// # Safety
    ///
    /// `stmt` must be a valid `sqlite3_stmt*` compiled against `db`.
    pub(super) unsafe fn from_raw(stmt: *mut c_void, db: *mut c_void) -> Self {
        debug_assert!(!stmt.is_null());
        Self { stmt, db }
    }

    /// Binds `values` to parameters `?1..?N`.
    pub fn bind_values(&mut self, values: &[Value]) -> DbResult<()> {
        for (i, val) in values.iter().enumerate() {
            let idx = c_int::try_from(i + 1)
                .map_err(|_| DbError::new(ffi::SQLITE_MISUSE, "too many parameters"))?;
            let rc = match val {
                Value::Integer(v) => unsafe { ffi::sqlite3_bind_int64(self.stmt, idx, *v) },
                Value::Text(v) => {
                    let len = Self::byte_len(v.len())?;
                    unsafe {
                        ffi::sqlite3_bind_text(
                            self.stmt,
                            idx,
                            v.as_ptr().cast(),
                            len,
                            ffi::SQLITE_TRANSIENT,
                        )
                    }
                }
                Value::Null => unsafe { ffi::sqlite3_bind_null(self.stmt, idx) },
            };
            if rc != ffi::SQLITE_OK {
                return Err(self.last_error(rc));
            }
        }
        Ok(())
    }

    /// Advances the statement by one step.
    pub fn step(&mut self) -> DbResult<StepResult> {
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            ffi::SQLITE_ROW => Ok(StepResult::Row),
            ffi::SQLITE_DONE => Ok(StepResult::Done),
            _ => Err(self.last_error(rc)),
        }
    }

    /// Rewinds the statement so it can be stepped again. Bindings are kept.
    pub fn reset(&mut self) -> DbResult<()> {
        let rc = unsafe { ffi::sqlite3_reset(self.stmt) };
        if rc != ffi::SQLITE_OK {
            return Err(self.last_error(rc));
        }
        Ok(())
    }

    /// Sets every parameter back to NULL.
    pub fn clear_bindings(&mut self) -> DbResult<()> {
        let rc = unsafe { ffi::sqlite3_clear_bindings(self.stmt) };
        if rc != ffi::SQLITE_OK {
            return Err(self.last_error(rc));
        }
        Ok(())
    }

    /// Number of `?` parameters the statement expects.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        usize::try_from(unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) }).unwrap_or(0)
    }

    /// Reads a column as `i64`. NULL reads as 0.
    #[must_use]
    pub fn column_i64(&self, idx: usize) -> i64 {
        unsafe { ffi::sqlite3_column_int64(self.stmt, Self::col(idx)) }
    }

    /// Reads a column as UTF-8 text. NULL reads as an empty string.
    #[must_use]
    pub fn column_text(&self, idx: usize) -> String {
        unsafe {
            let ptr = ffi::sqlite3_column_text(self.stmt, Self::col(idx));
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    /// Reads a column as text, `None` for NULL.
    #[must_use]
    pub fn column_optional_text(&self, idx: usize) -> Option<String> {
        if self.is_column_null(idx) {
            None
        } else {
            Some(self.column_text(idx))
        }
    }

    /// `true` if the column is SQL NULL.
    #[must_use]
    pub fn is_column_null(&self, idx: usize) -> bool {
        unsafe { ffi::sqlite3_column_type(self.stmt, Self::col(idx)) == ffi::SQLITE_NULL }
    }

    fn col(idx: usize) -> c_int {
        c_int::try_from(idx).unwrap_or(c_int::MAX)
    }

    fn byte_len(len: usize) -> DbResult<c_int> {
        c_int::try_from(len).map_err(|_| DbError::new(ffi::SQLITE_MISUSE, "value too large"))
    }

    fn last_error(&self, code: c_int) -> DbError {
        let msg = unsafe {
            let ptr = ffi::sqlite3_errmsg(self.db);
            if ptr.is_null() {
                "unknown error".to_string()
            } else {
                CStr::from_ptr(ptr.cast::<c_char>())
                    .to_string_lossy()
                    .into_owned()
            }
        };
        DbError::new(code, msg)
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").finish_non_exhaustive()
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if !self.stmt.is_null() {
            unsafe {
                ffi::sqlite3_finalize(self.stmt);
            }
            self.stmt = std::ptr::null_mut();
        }
    }
}
