//! Diagnostic logging.
//!
//! Logging is off unless a level is given on the command line
//! (`--log-level`) or in `GIT_UNMERGED_LOG_LEVEL`. Events go to stderr or
//! to a file, as text or JSON. Stdout carries only the command report.
//!
//! The log options are read from the raw argument list before clap runs,
//! so invocations clap rejects (and turns into no-ops) can still be traced.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Target of every event emitted by this crate.
const CRATE_TARGET: &str = "git_unmerged";

const ENV_LEVEL: &str = "GIT_UNMERGED_LOG_LEVEL";
const ENV_FILE: &str = "GIT_UNMERGED_LOG_FILE";
const ENV_FORMAT: &str = "GIT_UNMERGED_LOG_FORMAT";

/// Severity threshold, `warning` accepted as an alias of `warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(LevelFilter);

impl LogLevel {
    pub const TRACE: Self = Self(LevelFilter::TRACE);
    pub const DEBUG: Self = Self(LevelFilter::DEBUG);
    pub const INFO: Self = Self(LevelFilter::INFO);
    pub const WARN: Self = Self(LevelFilter::WARN);
    pub const ERROR: Self = Self(LevelFilter::ERROR);

    fn directive(self) -> String {
        format!("{CRATE_TARGET}={}", self.0.to_string().to_ascii_lowercase())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::TRACE),
            "debug" => Ok(Self::DEBUG),
            "info" => Ok(Self::INFO),
            "warn" | "warning" => Ok(Self::WARN),
            "error" => Ok(Self::ERROR),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Event encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, with span close timings.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Where events are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Stderr,
    /// Appended to this file, created if missing.
    File(PathBuf),
}

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogConfig {
    /// `None` disables logging.
    pub level: Option<LogLevel>,
    pub target: LogTarget,
    pub format: LogFormat,
}

impl LogConfig {
    /// Reads the log options from raw arguments, falling back to `env`.
    ///
    /// Unparsable levels or formats are ignored rather than reported: the
    /// options may belong to an invocation that ends up doing nothing.
    pub fn resolve<F>(args: &[String], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |flag: &str, var: &str| flag_value(args, flag).or_else(|| env(var));

        LogConfig {
            level: pick("--log-level", ENV_LEVEL).and_then(|s| s.parse().ok()),
            target: pick("--log-file", ENV_FILE)
                .filter(|s| !s.is_empty())
                .map_or(LogTarget::Stderr, |s| LogTarget::File(PathBuf::from(s))),
            format: pick("--log-format", ENV_FORMAT)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }
}

/// Keeps the background writer alive; pending events flush on drop.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Log options from the process arguments and environment.
#[must_use]
pub fn parse_early_log_config(args: &[String]) -> LogConfig {
    LogConfig::resolve(args, |var| std::env::var(var).ok())
}

/// Installs the global subscriber.
///
/// Returns `None` when logging is disabled or a subscriber is already
/// installed. A log file that cannot be opened falls back to stderr.
///
/// ```rust,no_run
/// use git_unmerged::logging::{LogConfig, LogFormat, LogLevel, LogTarget, init_logging};
///
/// let _guard = init_logging(LogConfig {
///     level: Some(LogLevel::DEBUG),
///     target: LogTarget::File("/tmp/git-unmerged.log".into()),
///     format: LogFormat::Json,
/// });
/// ```
#[must_use = "the returned guard must be held until application exit"]
pub fn init_logging(config: LogConfig) -> Option<LogGuard> {
    let level = config.level?;
    let filter = EnvFilter::new(level.directive());

    let (writer, worker, to_terminal, open_error) = match &config.target {
        LogTarget::File(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                let (writer, worker) = tracing_appender::non_blocking(file);
                (writer, worker, false, None)
            }
            Err(e) => {
                let (writer, worker) = tracing_appender::non_blocking(std::io::stderr());
                let reason = format!("{}: {e}", path.display());
                (writer, worker, std::io::stderr().is_terminal(), Some(reason))
            }
        },
        LogTarget::Stderr => {
            let (writer, worker) = tracing_appender::non_blocking(std::io::stderr());
            (writer, worker, std::io::stderr().is_terminal(), None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(event_layer(config.format, writer, to_terminal))
        .try_init()
        .ok()?;

    if let Some(reason) = open_error {
        tracing::warn!(%reason, "cannot open log file, logging to stderr");
    }
    Some(LogGuard { _worker: worker })
}

fn event_layer(
    format: LogFormat,
    writer: NonBlocking,
    ansi: bool,
) -> Box<dyn Layer<EnvFilteredRegistry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .compact()
            .boxed(),
    }
}

type EnvFilteredRegistry = tracing_subscriber::layer::Layered<EnvFilter, Registry>;

/// Value of `flag`, given as `--flag value` or `--flag=value`.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().enumerate().find_map(|(i, arg)| {
        if arg == flag {
            args.get(i + 1).cloned()
        } else {
            arg.strip_prefix(flag)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        }
    })
}
