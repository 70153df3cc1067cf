//! # Portvakt Configuration System
//!
//! Layered configuration for the Portvakt failure monitor. Every component
//! reads its parameters from the single [`PortvaktConfig`] value built here at
//! startup; nothing is reconfigured at runtime.
//!
//! ## Layers
//! 1. Built-in defaults (monitor port 81, threshold 3)
//! 2. `config/portvakt.yaml`
//! 3. `config/<PORTVAKT_ENV>.yaml`
//! 4. `PORTVAKT_*` environment variables (`__` separates nested keys)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod detection;
mod error;
mod monitor;
mod prevention;
mod telemetry;
mod validation;

pub use capture::CaptureConfig;
pub use detection::DetectionConfig;
pub use error::ConfigError;
pub use monitor::MonitorConfig;
pub use prevention::{FirewallConfig, PreventionConfig, ADDRESS_PLACEHOLDER};
pub use telemetry::TelemetryConfig;

const BASE_CONFIG_FILE: &str = "config/portvakt.yaml";
const ENV_PREFIX: &str = "PORTVAKT_";

/// Top-level configuration container for all Portvakt components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct PortvaktConfig {
    /// Monitored service port and escalation threshold.
    #[validate(nested)]
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Capture Source launch parameters.
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Frame boundary and failure markers.
    #[validate(nested)]
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Enforcement Mechanism parameters.
    #[validate(nested)]
    #[serde(default)]
    pub prevention: PreventionConfig,

    /// Logging configuration.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PortvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Missing files are skipped; the defaults alone form a valid configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PortvaktConfig::default()));

        if Path::new(BASE_CONFIG_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_CONFIG_FILE));
        }

        let env = std::env::var("PORTVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file, layered over the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(PortvaktConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
