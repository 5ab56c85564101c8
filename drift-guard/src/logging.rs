//! Logging utilities and configuration for drift-guard.
//!
//! Diagnostics are emitted through `tracing`. Events meant for operators
//! (alerts, status, summaries) go through [`crate::sink`] instead, so the
//! subscriber installed here writes to stderr and leaves stdout to the sink.

use tracing::Level;

use crate::error::{MonitorError, MonitorResult};

/// Maximum number of bytes of an offending input line kept in diagnostics.
pub const MAX_LOGGED_LINE: usize = 120;

/// Emits an operator-facing diagnostic that quiet mode demotes to `debug`.
///
/// ```rust
/// # let quiet = false;
/// drift_guard::log_diagnostic!(quiet, path = "predictions.jsonl", "waiting for log file");
/// ```
#[macro_export]
macro_rules! log_diagnostic {
    ($quiet:expr, $($arg:tt)*) => {
        if $quiet {
            tracing::debug!($($arg)*);
        } else {
            tracing::warn!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
///
/// Truncation always lands on a UTF-8 character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let mut end = max_length;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &value[..end])
    }
}

/// Configuration for the process-wide tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for dependencies and the application
    pub level: Level,
    /// Log level for drift-guard components specifically
    pub crate_level: Level,
    /// Whether to use JSON output format
    pub json_format: bool,
    /// Environment filter override
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            crate_level: Level::INFO,
            json_format: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration for production use: JSON lines, warnings only.
    pub fn production() -> Self {
        Self {
            level: Level::WARN,
            crate_level: Level::WARN,
            json_format: true,
            env_filter: None,
        }
    }

    /// Creates a configuration for development use.
    pub fn development() -> Self {
        Self {
            level: Level::INFO,
            crate_level: Level::DEBUG,
            json_format: false,
            env_filter: None,
        }
    }

    /// Sets the log level for drift-guard components.
    pub fn with_crate_level(mut self, level: Level) -> Self {
        self.crate_level = level;
        self
    }

    /// Sets whether to use JSON output format.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Sets a custom environment filter.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Builds the environment filter string.
    pub fn env_filter(&self) -> String {
        if let Some(ref filter) = self.env_filter {
            filter.clone()
        } else {
            format!(
                "{},drift_guard={},drift_monitor={}",
                self.level.as_str().to_lowercase(),
                self.crate_level.as_str().to_lowercase(),
                self.crate_level.as_str().to_lowercase()
            )
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter when set.
///
/// # Examples
///
/// ```rust,no_run
/// use drift_guard::logging::{init_logging, LoggingConfig};
///
/// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
/// ```
pub fn init_logging(config: LoggingConfig) -> MonitorResult<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| MonitorError::configuration(format!("failed to install logger: {e}")))
}
