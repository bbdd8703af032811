//! # Logging Utilities
//!
//! Logging infrastructure for unmangle using `tracing`.
//!
//! Console output goes to stderr so decoded names on stdout stay clean.
//! A log file can be added next to the console output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unmangle_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be flushed to file
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=unmangle_core=trace`)
//! - `UNMANGLE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `UNMANGLE_LOG_FILE`: Optional path of a log file written alongside the console

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::{NaiveDate, Utc};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const LOG_FORMAT_VAR: &str = "UNMANGLE_LOG_FORMAT";
pub const LOG_FILE_VAR: &str = "UNMANGLE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    /// Most verbose; includes every descriptor step
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Everything needed to set up the global subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    pub format: LogFormat,
    /// Explicit level; takes precedence over `RUST_LOG`.
    pub level: Option<LogLevel>,
    /// Extra log file, written without ANSI colors.
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Read `UNMANGLE_LOG_FORMAT` and `UNMANGLE_LOG_FILE`.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`LogConfig::from_env`] with a custom variable source.
    ///
    /// An unknown format falls back to pretty output.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        Self {
            format: lookup(LOG_FORMAT_VAR)
                .and_then(|s| LogFormat::from_str(&s).ok())
                .unwrap_or_default(),
            level: None,
            file: lookup(LOG_FILE_VAR).filter(|s| !s.is_empty()).map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        if level.is_some() {
            self.level = level;
        }
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    /// Log to a dated file inside `dir`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: &Path) -> Self
    {
        self.file = Some(dated_log_file(dir, Utc::now().date_naive()));
        self
    }
}

/// Keeps the background file writer alive; drop it to flush and stop.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// `<dir>/YYYY-MM-DD-unmangle.log`
pub fn dated_log_file(dir: &Path, date: NaiveDate) -> PathBuf
{
    dir.join(format!("{}-unmangle.log", date.format("%Y-%m-%d")))
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file
/// directory cannot be created.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_with(&LogConfig::from_env())
}

/// Initialize logging with explicit level and format
///
/// ## Example
///
/// ```rust,no_run
/// use unmangle_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_with(&LogConfig::from_env().with_level(Some(level)).with_format(format))
}

/// Initialize logging from a [`LogConfig`]
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with(config: &LogConfig) -> Result<LoggingGuard, LoggingError>
{
    let rust_log = env::var("RUST_LOG").ok();
    let filter = || build_filter(config.level.map(Into::into), rust_log.as_deref());

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.format, filter())];
    let mut guard = None;

    if let Some(path) = &config.file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| LoggingError::InvalidFile(path.display().to_string()))?;
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(file_layer(config.format, writer, filter()));
        guard = Some(file_guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// Priority: explicit level, then `RUST_LOG`, then `warn`.
fn build_filter(explicit: Option<Level>, rust_log: Option<&str>) -> EnvFilter
{
    if let Some(level) = explicit {
        return EnvFilter::new(level.to_string());
    }
    rust_log
        .and_then(|filter| EnvFilter::try_new(filter).ok())
        .unwrap_or_else(|| EnvFilter::new(Level::WARN.to_string()))
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => layer.with_ansi(true).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(false).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// The log file path has no file name
    #[error("Invalid log file: {0}")]
    InvalidFile(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("dev").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warn").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("debug").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_config_from_lookup()
    {
        let vars: HashMap<&str, &str> = [(LOG_FORMAT_VAR, "JSON"), (LOG_FILE_VAR, "/tmp/unmangle.log")].into();
        let config = LogConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string()));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/unmangle.log")));
        assert_eq!(config.level, None);

        let fallback = LogConfig::from_lookup(|name| (name == LOG_FORMAT_VAR).then(|| "loud".to_string()));
        assert_eq!(fallback, LogConfig::default());
    }

    #[test]
    fn test_explicit_level_wins()
    {
        let config = LogConfig::default().with_level(Some(LogLevel::Debug)).with_level(None);
        assert_eq!(config.level, Some(LogLevel::Debug));
        assert_eq!(
            build_filter(Some(Level::DEBUG), Some("error")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            build_filter(None, Some("unmangle_core=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(build_filter(None, None).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_dated_log_file()
    {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            dated_log_file(Path::new("/var/log"), date),
            PathBuf::from("/var/log/2024-03-09-unmangle.log")
        );
    }
}
