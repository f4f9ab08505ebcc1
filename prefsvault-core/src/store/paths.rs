//! Storage path helpers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const SQL_DIRNAME: &str = "sql";
const DB_FILENAME: &str = "db.sqlite";
const WAL_SUFFIX: &str = "-wal";
const SHM_SUFFIX: &str = "-shm";

/// Locations of the settings database under `<config_dir>/sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    sql_dir: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `config_dir`.
    #[must_use]
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            sql_dir: config_dir.as_ref().join(SQL_DIRNAME),
        }
    }

    /// Dedicated directory holding the database and its side files.
    #[must_use]
    pub fn sql_dir(&self) -> &Path {
        &self.sql_dir
    }

    /// Primary database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.sql_dir.join(DB_FILENAME)
    }

    /// Write-ahead log next to the primary file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        side_file(&self.db_path(), WAL_SUFFIX)
    }

    /// Shared-memory index next to the primary file.
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        side_file(&self.db_path(), SHM_SUFFIX)
    }
}

/// `<db_path><suffix>`, the naming the engine uses for WAL side files.
pub(crate) fn side_file(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(db_path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// The primary file followed by its `-wal` and `-shm` side files.
pub(crate) fn database_files(db_path: &Path) -> [PathBuf; 3] {
    [
        db_path.to_path_buf(),
        side_file(db_path, WAL_SUFFIX),
        side_file(db_path, SHM_SUFFIX),
    ]
}

/// Creates `dir` (and parents) if missing. New directories get mode `0o777`
/// before umask on Unix.
pub(crate) fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder.create(dir)
}
