//! Per-connection prepared statement cache.
//!
//! The cache is a field of [`Connection`](super::Connection), so every entry
//! is finalized together with the connection that compiled it and a freshly
//! opened connection always starts empty. Query text is the only key: two
//! calls with byte-identical SQL share one compiled statement.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use super::statement::Statement;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Statements currently parked in the cache.
    pub cached: usize,
    /// Statements compiled through the cache since the connection opened.
    pub compiled: usize,
}

#[derive(Default)]
pub(crate) struct StatementCache {
    entries: RefCell<HashMap<String, Statement>>,
    compiled: Cell<usize>,
}

impl StatementCache {
    /// Removes the statement for `sql`, compiling it with `compile` on a miss.
    /// A failed compilation leaves the cache untouched.
    pub(crate) fn checkout<E>(
        &self,
        sql: &str,
        compile: impl FnOnce() -> Result<Statement, E>,
    ) -> Result<CachedStatement<'_>, E> {
        let hit = self.entries.borrow_mut().remove(sql);
        let stmt = match hit {
            Some(stmt) => stmt,
            None => {
                let stmt = compile()?;
                self.compiled.set(self.compiled.get() + 1);
                stmt
            }
        };
        Ok(CachedStatement {
            sql: sql.to_owned(),
            stmt: Some(stmt),
            cache: self,
        })
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            cached: self.entries.borrow().len(),
            compiled: self.compiled.get(),
        }
    }

    /// Finalizes every parked statement.
    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    fn checkin(&self, sql: String, mut stmt: Statement) {
        // A failed step leaves its code on reset; the statement itself is
        // still rewound and reusable.
        let _ = stmt.reset();
        let _ = stmt.clear_bindings();
        self.entries.borrow_mut().insert(sql, stmt);
    }
}

/// A statement borrowed from the cache; returned to it when dropped.
pub struct CachedStatement<'conn> {
    sql: String,
    stmt: Option<Statement>,
    cache: &'conn StatementCache,
}

impl Deref for CachedStatement<'_> {
    type Target = Statement;

    fn deref(&self) -> &Statement {
        self.stmt.as_ref().expect("statement present until drop")
    }
}

impl DerefMut for CachedStatement<'_> {
    fn deref_mut(&mut self) -> &mut Statement {
        self.stmt.as_mut().expect("statement present until drop")
    }
}

impl Drop for CachedStatement<'_> {
    fn drop(&mut self) {
        if let Some(stmt) = self.stmt.take() {
            self.cache.checkin(std::mem::take(&mut self.sql), stmt);
        }
    }
}
