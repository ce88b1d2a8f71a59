//! Logging bootstrap for processes hosting the pool
//!
//! The pool itself only emits `tracing` events. Hosts that have no subscriber
//! of their own can call [`init`] to get:
//! - pretty console output for development
//! - daily-rotated JSON files for production
//! - `RUST_LOG` overriding the configured filter

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files should be written
    pub log_dir: PathBuf,

    /// Whether to write JSON log files
    pub enable_json_logs: bool,

    /// Whether to enable pretty console output
    pub enable_console_logs: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close events
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,erpool_core=debug,erpool_connection=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON files only, pool events at info
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,erpool_core=info,erpool_connection=info".to_string(),
        }
    }

    /// Pretty console output, verbose pool events
    pub fn development() -> Self {
        Self::default()
    }

    /// Same preset, writing files under `log_dir`
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Console only, everything at debug
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("erpool-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }
}

/// Flushes the JSON log file when dropped
///
/// Hold it for the lifetime of the process; events emitted after it is
/// dropped are not written to the file.
#[must_use = "dropping the guard stops the log file writer"]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Initialize the global subscriber with the given configuration
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter))
    };

    // NEW/CLOSE rather than ENTER: async spans are re-entered on every poll
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut file_writer = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter())
            .boxed();

        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "erpool.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_writer = Some(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter())
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );

    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

/// Initialize logging with the preset matching the build profile
pub fn init_default() -> anyhow::Result<LoggingGuard> {
    let config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };

    init(config)
}

/// Get the log directory path
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("erpool")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = LoggingConfig::production();
        assert!(production.enable_json_logs);
        assert!(!production.enable_console_logs);
        assert!(production.default_filter.contains("erpool_connection=info"));

        let testing = LoggingConfig::testing();
        assert!(!testing.enable_json_logs);
        assert_eq!(testing.default_filter, "debug");
    }

    #[test]
    fn test_with_log_dir_keeps_preset() {
        let config = LoggingConfig::production().with_log_dir("/var/log/erpool");
        assert_eq!(config.log_dir, PathBuf::from("/var/log/erpool"));
        assert!(config.enable_json_logs);
    }

    // The only test in this crate that installs a global subscriber
    #[test]
    fn test_init_writes_json_file_and_rejects_second_init() {
        let log_dir = tempfile::tempdir().expect("temp dir");
        let config = LoggingConfig {
            log_dir: log_dir.path().to_path_buf(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: "erpool_connection::logging=info".to_string(),
        };

        let guard = init(config.clone()).expect("first init");
        let files: Vec<_> = std::fs::read_dir(log_dir.path())
            .expect("read log dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(
            files.iter().any(|name| name.starts_with("erpool.log")),
            "no log file in {files:?}"
        );

        assert!(init(config).is_err());
        drop(guard);
    }

    #[test]
    fn test_log_directory_is_namespaced() {
        let dir = log_directory();
        assert!(dir.ends_with("erpool/logs"));
    }
}
