//! Logging setup for Courier
//!
//! Courier crates emit `tracing` events and spans; this crate installs the
//! subscriber that writes them out. Defaults to JSON on STDOUT at INFO.
//!
//! # Examples
//!
//! ```no_run
//! use courier_log::*;
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .with_env_filter("courier_events=trace,courier_registry=debug")
//!     .init()
//!     .expect("logging already initialised");
//!
//! info!("Dispatcher ready");
//! ```
//!
//! `RUST_LOG` overrides the configured level when no explicit filter is set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self as subscriber_fmt, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use tracing::{debug, error, info, trace, warn};

/// Minimum level written when no filter directives are given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Directive string for EnvFilter
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(LogError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured, machine-readable
    Json,
    Plain,
    /// Multi-line, for development
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" => Ok(LogFormat::Plain),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

/// Where formatted records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to a single file
    File(String),
    /// Write to rotating log files
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),

    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    #[error("Invalid filter directives '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("Failed to open log file: {0}")]
    Io(#[from] io::Error),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    /// Module path of the emitting crate, e.g. `courier_events::dispatcher`
    pub targets: bool,
    pub file_line: bool,
    /// Emit span close events, which carry per-event dispatch timings
    pub spans: bool,
    /// Enable ANSI colors (ignored for JSON)
    pub colors: bool,
    /// Custom filter directives, overriding `level`
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set filter directives such as `"courier_events=trace,info"`
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter built from this configuration
    ///
    /// Explicit directives must parse. Without them `RUST_LOG` is used when
    /// set and valid, otherwise `level`.
    pub fn build_filter(&self) -> Result<EnvFilter, LogError> {
        match &self.env_filter {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|e| LogError::InvalidFilter {
                    directives: directives.clone(),
                    reason: e.to_string(),
                })
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber
    ///
    /// The returned guard flushes buffered output when dropped and must be
    /// kept alive for as long as logs should be written.
    pub fn init(self) -> Result<WorkerGuard, LogError> {
        let filter = self.build_filter()?;

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => {
                let appender = tracing_appender::rolling::RollingFileAppender::new(
                    rotation.to_tracing_rotation(),
                    directory,
                    prefix,
                );
                tracing_appender::non_blocking(appender)
            }
        };

        self.init_with_writer(writer, filter)?;
        Ok(guard)
    }

    fn init_with_writer<W>(&self, writer: W, filter: EnvFilter) -> Result<(), LogError>
    where
        W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let span_events = if self.spans { FmtSpan::CLOSE } else { FmtSpan::NONE };

        let base = subscriber_fmt::layer()
            .with_writer(writer)
            .with_target(self.targets)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_span_events(span_events);

        // JSON never carries ANSI escapes.
        let layer = match self.format {
            LogFormat::Json => base
                .json()
                .with_current_span(self.spans)
                .with_span_list(self.spans)
                .boxed(),
            LogFormat::Plain => base.with_ansi(self.colors).boxed(),
            LogFormat::Pretty => base.pretty().with_ansi(self.colors).boxed(),
            LogFormat::Compact => base.compact().with_ansi(self.colors).boxed(),
        };

        let result = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();

        result.map_err(|e| LogError::AlreadyInitialized(e.to_string()))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}
