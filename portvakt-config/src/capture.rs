//! Capture Source configuration.
//!
//! Describes how the external packet-capture process is launched. The
//! monitored port itself lives in [`crate::MonitorConfig`]; the capture filter
//! always pairs it with a companion port.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Capture process parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Capture program to execute.
    #[validate(length(min = 1))]
    #[serde(default = "default_program")]
    pub program: String,

    /// Prefix the capture command with `sudo`?
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    /// Network interface to listen on (`any` for all interfaces).
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Second port always included in the capture filter.
    #[validate(range(min = 1))]
    #[serde(default = "default_companion_port")]
    pub companion_port: u16,

    /// Snapshot length in bytes; 0 captures full packets.
    #[validate(range(max = 262144))]
    #[serde(default)]
    pub snaplen: u32,
}

fn default_program() -> String {
    "tcpdump".into()
}

fn default_use_sudo() -> bool {
    true
}

fn default_interface() -> String {
    "any".into()
}

fn default_companion_port() -> u16 {
    443
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            use_sudo: default_use_sudo(),
            interface: default_interface(),
            companion_port: default_companion_port(),
            snaplen: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capture_config_is_valid() {
        CaptureConfig::default()
            .validate()
            .expect("Default config should be valid");
    }

    #[test]
    fn rejects_bad_interface_name() {
        let config = CaptureConfig {
            interface: "eth0; rm -rf /".into(),
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
