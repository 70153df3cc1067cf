//! # Portvakt Telemetry
//!
//! Crate for logging and metrics. Operators observe failed attempts and
//! blocks through the log; the metrics registry backs run summaries.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
