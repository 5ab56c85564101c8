//! Prelude for commonly used types and traits in drift-guard.

pub use crate::alert::{Alert, RunSummary, StatusReport};
pub use crate::config::MonitorConfig;
pub use crate::detector::{Adwin, ChangeDetector};
pub use crate::engine::{DriftMonitor, MonitorState};
pub use crate::error::{MonitorError, MonitorResult};
pub use crate::logging::{init_logging, LoggingConfig};
pub use crate::sink::{ConsoleSink, EventSink, JsonLinesSink, MemorySink, MonitorEvent};
