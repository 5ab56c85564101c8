//! Decoding of prediction log lines into observations.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::logging::{truncate_field, MAX_LOGGED_LINE};

/// Field holding the observed scalar.
const VALUE_FIELD: &str = "value";

/// Field name used by older prediction services for the same scalar.
const LEGACY_VALUE_FIELD: &str = "prediction";

/// A single decoded scalar observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// RFC3339 timestamp as written by the producer.
    pub timestamp: String,

    /// The observed model output.
    pub value: f64,
}

impl Observation {
    /// Creates a new observation.
    pub fn new(timestamp: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }
}

/// Reasons a non-blank line could not be turned into an [`Observation`].
///
/// The offending line is kept, truncated, for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("malformed JSON ({reason}): {line}")]
    Malformed { line: String, reason: String },

    #[error("record is not a JSON object: {line}")]
    NotAnObject { line: String },

    #[error("record has no `value` field: {line}")]
    MissingValue { line: String },

    #[error("record `value` is not a number: {line}")]
    InvalidValue { line: String },
}

impl DecodeError {
    /// The (truncated) line that failed to decode.
    pub fn line(&self) -> &str {
        match self {
            DecodeError::Malformed { line, .. }
            | DecodeError::NotAnObject { line }
            | DecodeError::MissingValue { line }
            | DecodeError::InvalidValue { line } => line,
        }
    }
}

/// Stateless decoder for newline-delimited JSON prediction records.
///
/// Accepts `{"timestamp": "...", "value": <number>}`; `prediction` is accepted
/// as an alias for `value`, and any other fields are ignored. A missing
/// timestamp is replaced with the current UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDecoder;

impl RecordDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes one line.
    ///
    /// Returns `Ok(None)` for blank lines, which are not errors.
    pub fn decode(&self, line: &str) -> Result<Option<Observation>, DecodeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let record: Value = serde_json::from_str(trimmed).map_err(|e| DecodeError::Malformed {
            line: truncate_field(trimmed, MAX_LOGGED_LINE),
            reason: e.to_string(),
        })?;

        let Value::Object(fields) = record else {
            return Err(DecodeError::NotAnObject {
                line: truncate_field(trimmed, MAX_LOGGED_LINE),
            });
        };

        let raw_value = fields
            .get(VALUE_FIELD)
            .or_else(|| fields.get(LEGACY_VALUE_FIELD))
            .ok_or_else(|| DecodeError::MissingValue {
                line: truncate_field(trimmed, MAX_LOGGED_LINE),
            })?;

        let value = raw_value.as_f64().ok_or_else(|| DecodeError::InvalidValue {
            line: truncate_field(trimmed, MAX_LOGGED_LINE),
        })?;

        let timestamp = match fields.get("timestamp").and_then(Value::as_str) {
            Some(ts) => ts.to_string(),
            None => Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        Ok(Some(Observation { timestamp, value }))
    }
}
