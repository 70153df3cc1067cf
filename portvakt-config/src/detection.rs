//! Frame detection markers.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Literal markers used to delimit frames and recognise failed logins.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct DetectionConfig {
    /// A line containing this text closes the current frame.
    #[validate(length(min = 1))]
    #[serde(default = "default_boundary_marker")]
    pub boundary_marker: String,

    /// A frame containing this text is an authentication failure.
    #[validate(length(min = 1))]
    #[serde(default = "default_failure_marker")]
    pub failure_marker: String,
}

fn default_boundary_marker() -> String {
    "HTTP/1.1".into()
}

fn default_failure_marker() -> String {
    "HTTP/1.1 401 Unauthorized".into()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            boundary_marker: default_boundary_marker(),
            failure_marker: default_failure_marker(),
        }
    }
}
