use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or running a drift monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Invalid configuration. Always fatal and raised before the loop starts.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O failure while reading the monitored log.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem notification source could not be set up.
    #[error("Watch error: {message}")]
    Watch { message: String },

    /// An output sink rejected an event.
    #[error("Sink error: {message}")]
    Sink { message: String },

    /// Serialization of an output event failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl MonitorError {
    /// Creates a configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the engine recovers from this error on its own
    /// (retry on the next poll tick or fall back to polling).
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::Io { .. } | MonitorError::Watch { .. })
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<notify::Error> for MonitorError {
    fn from(err: notify::Error) -> Self {
        Self::Watch {
            message: err.to_string(),
        }
    }
}

/// Result type for monitor operations.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
