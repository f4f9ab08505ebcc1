//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use prefsvault_core::logger::{LogLevel, Logger};
use prefsvault_core::{InitializeOptions, Server};
use secrecy::SecretString;

pub const TEST_KEY: &str = "integrationKey42";

pub fn key(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

pub fn temp_root() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp dir")
}

/// A server opened on `config_dir` with [`TEST_KEY`].
pub fn open_server(config_dir: &Path) -> Arc<Server> {
    let server = Arc::new(Server::new());
    server
        .initialize(InitializeOptions::new(config_dir, key(TEST_KEY)))
        .expect("initialize server");
    server
}

/// Logger that keeps every message it receives.
#[derive(Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
    pub fn messages(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().expect("lock records").clone()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.messages()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: String) {
        self.records
            .lock()
            .expect("lock records")
            .push((level, message));
    }
}
