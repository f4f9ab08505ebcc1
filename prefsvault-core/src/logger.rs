use std::sync::{Arc, OnceLock};

/// Sink for log messages emitted by the store.
///
/// Hosts that already own a logging pipeline (a desktop shell forwarding to
/// its own log file, for example) implement this and pass it to
/// [`Server::initialize`](crate::Server::initialize) or [`set_logger`].
///
/// ```rust
/// use prefsvault_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal progress, such as a migration step.
    Info,
    /// Something unexpected that the store recovered from.
    Warn,
    /// A failed operation.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// `log::Log` implementation forwarding to the registered [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let from_prefsvault = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("prefsvault"));
        let verbose = matches!(record.level(), log::Level::Debug | log::Level::Trace);

        // Dependencies' debug/trace chatter stays out of the host's log.
        if verbose && !from_prefsvault {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Registers `logger` as the destination of the store's log output.
///
/// Only the first registration in a process takes effect; returns `false`
/// if a logger was already registered here or another `log` backend was
/// installed first.
pub fn set_logger(logger: Arc<dyn Logger>) -> bool {
    if LOGGER_INSTANCE.set(logger).is_err() {
        return false;
    }

    static LOGGER: ForeignLogger = ForeignLogger;
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(log::LevelFilter::Trace);
            true
        }
        Err(_) => false,
    }
}
