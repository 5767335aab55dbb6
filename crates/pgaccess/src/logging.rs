//! Structured logging setup with console and optional file output.
//!
//! Provides:
//! - Daily rotating log files when a log directory is configured
//! - Build-type conditional log levels
//! - Console-only fallback when file logging fails
//! - Environment variable override via PGACCESS_LOG or RUST_LOG
//!
//! Statements are logged on the `pgaccess::sql` target, so
//! `PGACCESS_LOG=pgaccess::sql=off` silences them without touching the
//! client's debug flag.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "PGACCESS_LOG";

/// Logging configuration.
pub struct LogConfig {
    /// Directory for log files (None = console only)
    pub log_dir: Option<PathBuf>,
    /// Whether stdout is a terminal (enables ANSI colors)
    pub is_pty: bool,
    /// Optional custom log filter
    pub log_filter: Option<String>,
}

impl LogConfig {
    /// Console-only logging.
    pub fn console() -> Self {
        Self { log_dir: None, is_pty: atty::is(atty::Stream::Stdout), log_filter: None }
    }

    /// Console plus daily rotating files in `log_dir`.
    pub fn with_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: Some(log_dir.into()), ..Self::console() }
    }

    /// Set custom log filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Guard that must be held for the lifetime of the application.
///
/// Dropping this guard flushes pending log entries.
pub struct LoggingGuard {
    worker_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Check if log entries are also written to files.
    pub fn writes_files(&self) -> bool {
        self.worker_guard.is_some()
    }
}

/// Initialize logging with the given configuration.
///
/// If file logging initialization fails, falls back to console-only.
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let Some(log_dir) = config.log_dir.as_ref() else {
        return init_stdout_logging(config.log_filter.as_deref(), config.is_pty);
    };

    match init_file_logging(log_dir, &config) {
        Ok(guard) => LoggingGuard { worker_guard: Some(guard) },
        Err(e) => {
            eprintln!("Warning: Failed to initialize file logging: {}. Using console only.", e);
            init_stdout_logging(config.log_filter.as_deref(), config.is_pty)
        }
    }
}

/// Initialize stdout-only logging.
fn init_stdout_logging(filter: Option<&str>, ansi: bool) -> LoggingGuard {
    let env_filter = build_env_filter(filter);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();

    LoggingGuard { worker_guard: None }
}

/// Initialize file + console logging.
fn init_file_logging(
    log_dir: &Path,
    config: &LogConfig,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pgaccess")
        .filename_suffix("log")
        .build(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout = std::io::stdout.with_max_level(tracing::Level::INFO);
    let combined = stdout.and(non_blocking);

    let env_filter = build_env_filter(config.log_filter.as_deref());

    tracing_subscriber::fmt()
        .with_writer(combined)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()?;

    Ok(guard)
}

/// Build the environment filter from config or defaults.
fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    // Priority: custom filter > PGACCESS_LOG > RUST_LOG > default
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Get the default log filter based on build type.
pub fn default_log_filter() -> &'static str {
    #[cfg(debug_assertions)]
    {
        "info,pgaccess=debug,pgaccess_cli=debug,tokio_postgres=warn,deadpool=warn"
    }
    #[cfg(not(debug_assertions))]
    {
        "warn,pgaccess=info,pgaccess_cli=info,tokio_postgres=warn,deadpool=warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_log_filter()).is_ok());
        assert!(default_log_filter().contains("pgaccess="));
    }

    #[test]
    fn test_invalid_custom_filter_falls_back() {
        // Must not panic on garbage.
        let _ = build_env_filter(Some("pgaccess=[[["));
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::with_dir("/tmp/pgaccess-logs").with_filter("debug");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/pgaccess-logs")));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert!(LogConfig::console().log_dir.is_none());
    }

    #[test]
    fn test_file_logging_falls_back_when_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let guard = init_logging(LogConfig::with_dir(&blocker));
        assert!(!guard.writes_files());
    }
}
