//! Helpers shared by the drift-guard demos.

use chrono::{SecondsFormat, Utc};

/// Low-variance periodic value around `level`, the shape of a well-behaved
/// model output.
pub fn synthetic_value(level: f64, i: usize) -> f64 {
    level + (i % 10) as f64 * 0.001
}

/// One prediction log line for `value`, stamped with the current time.
pub fn prediction_line(value: f64) -> String {
    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "value": value,
        "model_version": "simulated",
    })
    .to_string()
}
