//! Build script for prefsvault-db.
//!
//! Fetches the sqlite3mc amalgamation from a pinned upstream release (unless
//! it is already cached in `OUT_DIR`), checks it against a pinned SHA-256,
//! extracts the two amalgamation files and compiles them into a static
//! library that the `ffi` module links against.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

// Pinned sqlite3mc release.
const SQLITE3MC_VERSION: &str = "2.2.7";
const SQLITE_VERSION: &str = "3.51.2";
const DOWNLOAD_URL: &str = "https://github.com/utelle/SQLite3MultipleCiphers/releases/download/v2.2.7/sqlite3mc-2.2.7-sqlite-3.51.2-amalgamation.zip";
const EXPECTED_SHA256: &str =
    "8e84aadc53bc09bda9cd307745a178191e7783e1b6478d74ffbcdf6a04f98085";

const AMALGAMATION_FILES: [&str; 2] =
    ["sqlite3mc_amalgamation.c", "sqlite3mc_amalgamation.h"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));
    let source_dir = out_dir.join(format!("sqlite3mc-{SQLITE3MC_VERSION}"));
    let amalgamation_c = source_dir.join(AMALGAMATION_FILES[0]);

    let cached = AMALGAMATION_FILES
        .iter()
        .all(|name| source_dir.join(name).exists());
    if !cached {
        std::fs::create_dir_all(&source_dir).expect("failed to create source dir");
        let zip_path = out_dir.join("sqlite3mc-amalgamation.zip");
        download(&zip_path);
        verify_checksum(&zip_path);
        extract(&zip_path, &source_dir);
    }

    compile(&amalgamation_c, &source_dir);
}

/// Downloads the pinned amalgamation zip using curl.
fn download(dest: &Path) {
    println!(
        "cargo:warning=Downloading sqlite3mc {SQLITE3MC_VERSION} (SQLite {SQLITE_VERSION})..."
    );
    let status = Command::new("curl")
        .args(["-fsSL", "--retry", "3", "-o"])
        .arg(dest)
        .arg(DOWNLOAD_URL)
        .status()
        .expect("failed to run curl -- is it installed?");
    assert!(status.success(), "curl failed with status {status}");
}

/// Hashes the archive in-process; no external `shasum` needed.
fn verify_checksum(zip_path: &Path) {
    let mut bytes = Vec::new();
    File::open(zip_path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .expect("failed to read downloaded archive");

    let digest = Sha256::digest(&bytes);
    let actual = digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    });
    assert_eq!(
        actual, EXPECTED_SHA256,
        "sqlite3mc checksum mismatch!\n  expected: {EXPECTED_SHA256}\n  actual:   {actual}"
    );
}

/// Copies the amalgamation sources out of the archive, flattening any
/// directory prefix the release may use.
fn extract(zip_path: &Path, dest_dir: &Path) {
    let file = File::open(zip_path).expect("failed to open archive");
    let mut archive = zip::ZipArchive::new(file).expect("invalid zip archive");

    let mut found = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("unreadable zip entry");
        let Some(base) = Path::new(entry.name())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
        else {
            continue;
        };
        if !AMALGAMATION_FILES.contains(&base.as_str()) {
            continue;
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .expect("failed to decompress amalgamation file");
        File::create(dest_dir.join(&base))
            .and_then(|mut out| out.write_all(&contents))
            .expect("failed to write amalgamation file");
        found += 1;
    }
    assert_eq!(
        found,
        AMALGAMATION_FILES.len(),
        "amalgamation sources not found in archive"
    );
}

/// Compiles the sqlite3mc amalgamation into a static library.
fn compile(amalgamation_c: &Path, include_dir: &Path) {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let mut build = cc::Build::new();
    build
        .file(amalgamation_c)
        .include(include_dir)
        .define("SQLITE_CORE", None)
        .define("SQLITE_THREADSAFE", "1")
        .define("SQLITE_DEFAULT_WAL_SYNCHRONOUS", "2")
        .define("SQLITE_DQS", "0")
        // Settings files are keyed with the SQLCipher scheme at runtime
        // (`PRAGMA cipher`), this only picks the compile-time default.
        .define("CODEC_TYPE", "CODEC_TYPE_SQLCIPHER")
        .define("ARGON2_NO_THREADS", None)
        .define("SQLITE_DEFAULT_MEMSTATUS", "0")
        .define("SQLITE_LIKE_DOESNT_MATCH_BLOBS", None)
        .define("SQLITE_OMIT_DEPRECATED", None)
        .define("SQLITE_OMIT_SHARED_CACHE", None);

    match target_os.as_str() {
        "macos" | "ios" => {
            build.define("HAVE_USLEEP", "1");
            build.define("HAVE_LOCALTIME_R", "1");
        }
        "linux" | "android" => {
            build.define("HAVE_USLEEP", "1");
            build.define("HAVE_LOCALTIME_R", "1");
            build.define("HAVE_POSIX_FALLOCATE", "1");
        }
        _ => {}
    }

    build.warnings(false);
    build.compile("sqlite3mc");
}
