//! Logging setup built on `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line, machine-grep-friendly.
    #[default]
    Compact,
    /// Multi-line, human-friendly.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

/// Builds up the configuration [`setup_logging`] applies.
///
/// # Example
///
/// ```no_run
/// use opsagent_telemetry::{LogConfig, LogFormat, setup_logging};
///
/// let config = LogConfig::new("debug")
///     .with_format(LogFormat::Pretty)
///     .with_directive("opsagent_runtime=trace");
/// setup_logging(&config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    default_level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Starts a config at the given default level (`"trace"`, `"debug"`,
    /// `"info"`, `"warn"`, `"error"`), applied when `RUST_LOG` is unset.
    #[must_use]
    pub fn new(default_level: impl Into<String>) -> Self {
        Self {
            default_level: default_level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            directives: Vec::new(),
        }
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Appends an additional `env_logger`-style directive (e.g.
    /// `"opsagent_runtime=trace"`), applied on top of the default level.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.default_level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;
        for directive in &self.directives {
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| TelemetryError::ConfigError(format!("{directive}: {e}")))?,
            );
        }
        Ok(filter)
    }
}

/// Installs a global `tracing` subscriber built from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] if a directive fails to
/// parse, or [`TelemetryError::InitError`] if a subscriber is already
/// installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;
    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = match (config.format, config.target) {
        (LogFormat::Json, LogTarget::Stdout) => builder.json().try_init(),
        (LogFormat::Json, LogTarget::Stderr) => builder.json().with_writer(std::io::stderr).try_init(),
        (LogFormat::Pretty, LogTarget::Stdout) => builder.pretty().try_init(),
        (LogFormat::Pretty, LogTarget::Stderr) => builder.pretty().with_writer(std::io::stderr).try_init(),
        (LogFormat::Compact, LogTarget::Stdout) => builder.compact().try_init(),
        (LogFormat::Compact, LogTarget::Stderr) => builder.compact().with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| TelemetryError::InitError(e.to_string()))
}

/// Installs a subscriber at `info` level, compact format, stdout — the
/// common case for a CLI entry point that has no other opinion.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}
