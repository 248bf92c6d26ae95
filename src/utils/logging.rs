//! # Logger Factory
//!
//! Named loggers that append `timestamp | name | LEVEL | message` lines to a
//! file and optionally to stderr. Each [`Logger`] owns its own `tracing`
//! dispatcher; the process-wide registry hands back the existing logger when
//! a name is requested again, so outputs are never attached twice.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Registry;

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("Unknown log level '{0}' (expected info or debug)")]
    UnknownLevel(String),
    #[error("Failed to open log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Logger registry lock poisoned")]
    RegistryPoisoned,
}

// --- Level ---

/// Levels a logger can be configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(LoggerError::UnknownLevel(s.to_string())),
        }
    }
}

// --- Line Format ---

/// `timestamp | name | LEVEL | message`
#[derive(Debug, Clone)]
struct PipeFormat {
    name: Arc<str>,
}

impl<S, N> FormatEvent<S, N> for PipeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        SystemTime.format_time(&mut writer)?;
        write!(writer, " | {} | {} | ", self.name, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// --- Logger ---

/// Handle to a named logger. Clones share the same outputs.
#[derive(Clone, Debug)]
pub struct Logger {
    name: Arc<str>,
    level: LogLevel,
    file_path: PathBuf,
    dispatch: Dispatch,
}

impl Logger {
    fn build(
        name: &str,
        file_path: &Path,
        stream: bool,
        level: LogLevel,
    ) -> Result<Self, LoggerError> {
        Self::build_with_writer(name, file_path, stream.then_some(std::io::stderr), level)
    }

    /// Like `build`, with `console` in place of stderr when present.
    pub(crate) fn build_with_writer<W>(
        name: &str,
        file_path: &Path,
        console: Option<W>,
        level: LogLevel,
    ) -> Result<Self, LoggerError>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .map_err(|source| LoggerError::Io {
                path: file_path.to_path_buf(),
                source,
            })?;

        let format = PipeFormat { name: Arc::from(name) };
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .event_format(format.clone())
            .with_writer(Mutex::new(file));
        let stream_layer = console.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(format.clone())
                .with_writer(writer)
        });

        let subscriber = Registry::default()
            .with(level.filter())
            .with(file_layer)
            .with(stream_layer);

        Ok(Logger {
            name: format.name,
            level,
            file_path: file_path.to_path_buf(),
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Runs `f` with this logger as the thread's default dispatcher, so any
    /// `tracing` event emitted inside (including the crate's own) lands here.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.in_scope(|| tracing::error!("{message}"));
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.in_scope(|| tracing::warn!("{message}"));
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.in_scope(|| tracing::info!("{message}"));
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.in_scope(|| tracing::debug!("{message}"));
    }
}

// --- Registry ---

static LOGGERS: OnceLock<Mutex<HashMap<String, Logger>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Logger>> {
    LOGGERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the logger registered under `name`, creating it on first use.
///
/// `level` must be `info` or `debug`. A later call with the same name returns
/// the first handle unchanged; its file, stream and level settings are not
/// revisited.
pub fn get_logger<P: AsRef<Path>>(
    name: &str,
    file_path: P,
    stream: bool,
    level: &str,
) -> Result<Logger, LoggerError> {
    let level = level.parse::<LogLevel>()?;
    get_logger_with_level(name, file_path, stream, level)
}

/// [`get_logger`] with an already parsed level.
pub fn get_logger_with_level<P: AsRef<Path>>(
    name: &str,
    file_path: P,
    stream: bool,
    level: LogLevel,
) -> Result<Logger, LoggerError> {
    let mut loggers = registry()
        .lock()
        .map_err(|_| LoggerError::RegistryPoisoned)?;
    if let Some(existing) = loggers.get(name) {
        return Ok(existing.clone());
    }

    let logger = Logger::build(name, file_path.as_ref(), stream, level)?;
    loggers.insert(name.to_string(), logger.clone());
    Ok(logger)
}

// --- Configuration ---

/// Serializable logger settings, e.g. a `logger:` block in a YAML run config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub name: String,
    pub file_path: PathBuf,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub level: LogLevel,
}

impl LoggerConfig {
    pub fn build(&self) -> Result<Logger, LoggerError> {
        get_logger_with_level(&self.name, &self.file_path, self.stream, self.level)
    }
}
