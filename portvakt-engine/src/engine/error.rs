use thiserror::Error;

use portvakt_capture::CaptureError;
use portvakt_config::ConfigError;
use portvakt_detection::DetectionError;
use portvakt_prevention::FirewallError;

use crate::engine::MonitorState;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Detection setup failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Firewall setup failed: {0}")]
    Firewall(#[from] FirewallError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Monitor is {actual}, expected {expected}")]
    InvalidState {
        expected: MonitorState,
        actual: MonitorState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
