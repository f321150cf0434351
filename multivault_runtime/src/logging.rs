//! Logging bootstrap for the runtime and CLI.
//!
//! # Invariants
//! - Initialization happens at most once per process.
//! - Repeating it with the same level and destination is a no-op.
//! - Any other repeat is rejected, never silently applied.
//! - Initialization never panics.

use std::path::{Path, PathBuf};

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;

use crate::error::{RuntimeError, RuntimeResult};

const LOG_FILE_BASENAME: &str = "multivault";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    /// `None` when logging to stderr.
    log_dir: Option<PathBuf>,
    _logger: LoggerHandle,
}

/// Start logging at `level`, into rotated files under `log_dir` or to
/// stderr when no directory is given.
///
/// # Errors
/// - `level` is not one of trace|debug|info|warn|error.
/// - `log_dir` is relative or cannot be created.
/// - Logging is already running with a different level or destination.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> RuntimeResult<()> {
    let level = normalize_level(level)?;
    let log_dir = log_dir.map(normalize_log_dir).transpose()?;

    let state = LOGGING_STATE.get_or_try_init(|| start(level, log_dir.clone()))?;
    if state.level != level || state.log_dir != log_dir {
        return Err(RuntimeError::Logging(format!(
            "logging already initialized with level `{}` at `{}`; refusing to switch",
            state.level,
            describe(state.log_dir.as_deref())
        )));
    }
    Ok(())
}

/// Active `(level, log_dir)`, or `None` before initialization.
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

fn start(level: &'static str, log_dir: Option<PathBuf>) -> RuntimeResult<LoggingState> {
    let logger = Logger::try_with_str(level)
        .map_err(|err| RuntimeError::Logging(format!("invalid log level `{level}`: {err}")))?;

    let logger = match &log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                RuntimeError::Logging(format!(
                    "failed to create log directory `{}`: {err}",
                    dir.display()
                ))
            })?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir.as_path())
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
        None => logger.log_to_stderr(),
    };

    let handle = logger
        .start()
        .map_err(|err| RuntimeError::Logging(format!("failed to start logger: {err}")))?;

    info!(
        "event=logging_init module=logging status=ok level={} destination={} version={}",
        level,
        describe(log_dir.as_deref()),
        env!("CARGO_PKG_VERSION")
    );

    Ok(LoggingState {
        level,
        log_dir,
        _logger: handle,
    })
}

fn describe(log_dir: Option<&Path>) -> String {
    log_dir.map_or_else(|| "stderr".to_string(), |dir| dir.display().to_string())
}

fn normalize_level(level: &str) -> RuntimeResult<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(RuntimeError::Logging(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        ))),
    }
}

fn normalize_log_dir(log_dir: &Path) -> RuntimeResult<PathBuf> {
    if log_dir.as_os_str().is_empty() {
        return Err(RuntimeError::Logging("log_dir cannot be empty".to_string()));
    }
    if !log_dir.is_absolute() {
        return Err(RuntimeError::Logging(format!(
            "log_dir must be an absolute path, got `{}`",
            log_dir.display()
        )));
    }
    Ok(log_dir.to_path_buf())
}
