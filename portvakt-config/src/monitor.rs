//! Monitored service and escalation threshold.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Monitoring parameters. Immutable once the configuration is loaded.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct MonitorConfig {
    /// Port of the service whose authentication failures are watched.
    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Failed attempts from one address before it is blocked.
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_port() -> u16 {
    81
}
fn default_failure_threshold() -> u32 {
    3
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn valid_default_monitor_config() {
        let config = MonitorConfig::default();
        config.validate().expect("Default config should be valid");
    }

    #[test]
    fn invalid_thresholds() {
        let mut config = MonitorConfig::default();
        config.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_port() {
        let config = MonitorConfig {
            port: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
