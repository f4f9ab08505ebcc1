//! Unit tests for the safe db wrapper.

use std::path::{Path, PathBuf};

use super::*;

fn temp_db_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("prefsvault-db-test.sqlite")
}

fn side_file(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[test]
fn test_open_in_memory() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);")
        .expect("create table");
    conn.execute(
        "INSERT INTO t (id, val) VALUES (?1, ?2)",
        params![1_i64, "hello"],
    )
    .expect("insert");
    let result = conn
        .query_row("SELECT val FROM t WHERE id = ?1", params![1_i64], |stmt| {
            Ok(stmt.column_text(0))
        })
        .expect("query");
    assert_eq!(result, "hello");
}

#[test]
fn test_query_row_no_rows_is_error() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
        .expect("create table");
    let optional = conn
        .query_row_optional("SELECT id FROM t WHERE id = 999", &[], |stmt| {
            Ok(stmt.column_i64(0))
        })
        .expect("query");
    assert!(optional.is_none());

    let err = conn
        .query_row("SELECT id FROM t WHERE id = 999", &[], |stmt| {
            Ok(stmt.column_i64(0))
        })
        .expect_err("no rows");
    assert!(err.is_no_rows());
}

#[test]
fn test_transaction_commit_and_rollback() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
        .expect("create table");
    {
        let tx = conn.transaction().expect("begin tx");
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![42_i64])
            .expect("insert");
        tx.commit().expect("commit");
    }
    {
        let tx = conn.transaction_immediate().expect("begin tx");
        tx.execute("INSERT INTO t (id) VALUES (?1)", params![99_i64])
            .expect("insert");
    }
    let ids = conn
        .query_row("SELECT group_concat(id) FROM t", &[], |stmt| {
            Ok(stmt.column_text(0))
        })
        .expect("query");
    assert_eq!(ids, "42");
}

#[test]
fn test_null_and_optional_columns() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);")
        .expect("create table");
    conn.execute(
        "INSERT INTO t (id, val) VALUES (?1, ?2)",
        params![1_i64, None::<String>],
    )
    .expect("insert");
    let (is_null, optional) = conn
        .query_row("SELECT val FROM t WHERE id = 1", &[], |stmt| {
            Ok((stmt.is_column_null(0), stmt.column_optional_text(0)))
        })
        .expect("query");
    assert!(is_null);
    assert_eq!(optional, None);
}

#[test]
fn test_prepare_cached_reuses_compiled_statement() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT);")
        .expect("create table");

    for i in 0..3_i64 {
        conn.execute_cached(
            "INSERT INTO t (id, val) VALUES (?1, ?2)",
            params![i, format!("v{i}")],
        )
        .expect("insert");
    }

    let stats = conn.statement_cache_stats();
    assert_eq!(stats.compiled, 1);
    assert_eq!(stats.cached, 1);

    let count = conn
        .query_row("SELECT count(*) FROM t", &[], |stmt| Ok(stmt.column_i64(0)))
        .expect("count");
    assert_eq!(count, 3);
}

#[test]
fn test_cached_statement_bindings_cleared_on_return() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    {
        let mut stmt = conn.prepare_cached("SELECT ?1").expect("prepare");
        stmt.bind_values(params!["bound"]).expect("bind");
        assert_eq!(stmt.step().expect("step"), StepResult::Row);
        assert_eq!(stmt.column_text(0), "bound");
    }
    let mut stmt = conn.prepare_cached("SELECT ?1").expect("prepare again");
    assert_eq!(stmt.parameter_count(), 1);
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert!(stmt.is_column_null(0));
    drop(stmt);
    assert_eq!(conn.statement_cache_stats().compiled, 1);
}

#[test]
fn test_failed_compilation_is_not_cached() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    assert!(conn.prepare_cached("SELEKT nonsense").is_err());
    assert_eq!(conn.statement_cache_stats(), CacheStats::default());
}

#[test]
fn test_cache_is_scoped_to_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_db_path(&dir);
    {
        let conn = Connection::open(&path, false).expect("open");
        conn.query_row_optional_cached("SELECT 1", &[], |stmt| Ok(stmt.column_i64(0)))
            .expect("query");
        assert_eq!(conn.statement_cache_stats().cached, 1);
        conn.close().expect("close");
    }
    let conn = Connection::open(&path, false).expect("reopen");
    assert_eq!(conn.statement_cache_stats(), CacheStats::default());
}

#[test]
fn test_encrypted_round_trip_and_wrong_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_db_path(&dir);
    let config = CipherConfig::default();

    {
        let conn = cipher::open_encrypted(&path, config, "CorrectHorse42").expect("open");
        conn.execute_batch("CREATE TABLE secret (id INTEGER PRIMARY KEY, val TEXT);")
            .expect("create table");
        conn.execute("INSERT INTO secret (id, val) VALUES (1, 'top-secret')", &[])
            .expect("insert");
        conn.close().expect("close");
    }

    {
        let conn = cipher::open_encrypted(&path, config, "CorrectHorse42").expect("reopen");
        let val = conn
            .query_row("SELECT val FROM secret WHERE id = 1", &[], |stmt| {
                Ok(stmt.column_text(0))
            })
            .expect("query");
        assert_eq!(val, "top-secret");
    }

    let err = cipher::open_encrypted(&path, config, "WrongKey").expect_err("wrong key");
    assert!(err.message.contains("key verification failed"), "{err}");

    let raw = std::fs::read(&path).expect("read file");
    assert!(!raw.windows(10).any(|w| w == b"top-secret"));
}

#[test]
fn test_durability_settings_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_db_path(&dir);
    let conn = cipher::open_encrypted(&path, CipherConfig::default(), "abc123").expect("open");
    assert_eq!(cipher::journal_mode(&conn).expect("journal mode"), "wal");
    let synchronous = conn
        .query_row("PRAGMA synchronous;", &[], |stmt| Ok(stmt.column_i64(0)))
        .expect("synchronous");
    assert_eq!(synchronous, 2);

    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
        .expect("create table");
    assert!(side_file(&path, "-wal").exists());
}

#[test]
fn test_version_pragmas() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    assert_eq!(cipher::user_version(&conn).expect("user_version"), 0);
    assert_eq!(cipher::schema_version(&conn).expect("schema_version"), 0);

    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
        .expect("create table");
    assert!(cipher::schema_version(&conn).expect("schema_version") > 0);

    cipher::set_user_version(&conn, 7).expect("set user_version");
    assert_eq!(cipher::user_version(&conn).expect("user_version"), 7);
}

#[test]
fn test_integrity_check_and_optimize() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    assert!(cipher::integrity_check(&conn).expect("check"));
    cipher::optimize(&conn).expect("optimize");
}
