//! Prevention system configuration.
//!
//! Parameters for the Enforcement Mechanism:
//! - external block/unblock command templates
//! - command timeout and dry-run switch
//! - allowlisted networks that are never blocked

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Placeholder replaced by the offending address in command templates.
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Prevention system configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PreventionConfig {
    /// Firewall command configuration.
    #[validate(nested)]
    #[serde(default)]
    pub firewall: FirewallConfig,

    /// Reset an address's counter even when its block attempt failed.
    #[serde(default = "default_true")]
    pub reset_on_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PreventionConfig {
    fn default() -> Self {
        Self {
            firewall: FirewallConfig::default(),
            reset_on_failure: true,
        }
    }
}

/// External firewall command configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct FirewallConfig {
    /// Program and arguments that deny traffic from `{address}`.
    #[validate(custom(function = validation::validate_command_template))]
    #[serde(default = "default_block_command")]
    pub block_command: Vec<String>,

    /// Program and arguments that lift a block on `{address}`.
    #[validate(custom(function = validation::validate_command_template))]
    #[serde(default = "default_unblock_command")]
    pub unblock_command: Vec<String>,

    /// Upper bound on a single firewall command (milliseconds).
    #[validate(range(min = 100, max = 60000))]
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Log blocks instead of executing the command.
    #[serde(default)]
    pub dry_run: bool,

    /// Networks whose addresses are never blocked.
    #[validate(custom(function = validation::validate_cidr_list))]
    #[serde(default)]
    pub allowlist: Vec<IpNetwork>,

    /// Lift each block after this many seconds; blocks are permanent when unset.
    #[validate(range(min = 1))]
    #[serde(default)]
    pub unblock_after_secs: Option<u64>,
}

fn default_block_command() -> Vec<String> {
    ["sudo", "ufw", "deny", "from", ADDRESS_PLACEHOLDER]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_unblock_command() -> Vec<String> {
    ["sudo", "ufw", "delete", "deny", "from", ADDRESS_PLACEHOLDER]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            block_command: default_block_command(),
            unblock_command: default_unblock_command(),
            timeout_ms: default_timeout_ms(),
            dry_run: false,
            allowlist: Vec::new(),
            unblock_after_secs: None,
        }
    }
}
