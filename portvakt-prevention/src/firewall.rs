//! ## portvakt-prevention::firewall
//! **Address blocking through an external firewall command**
//!
//! The address is substituted into a fixed argument vector and the program
//! is executed directly, without a shell. Every invocation is bounded by a
//! timeout so a hung command cannot stall the caller indefinitely.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portvakt_config::{FirewallConfig, ADDRESS_PLACEHOLDER};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("Firewall command template is empty")]
    EmptyCommand,

    #[error("Failed to launch firewall command `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Firewall command `{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Firewall command `{program}` timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Applies and lifts blocks for a single address.
#[async_trait]
pub trait BlockingAction: Send + Sync {
    /// Deny further traffic from `address`.
    async fn block(&self, address: &str) -> Result<(), FirewallError>;

    /// Lift a block previously applied to `address`.
    async fn unblock(&self, address: &str) -> Result<(), FirewallError>;
}

/// Selects the firewall implementation described by `config`.
pub fn build_firewall(config: &FirewallConfig) -> Result<Arc<dyn BlockingAction>, FirewallError> {
    if config.dry_run {
        warn!("Firewall dry-run enabled; addresses will not actually be blocked");
        return Ok(Arc::new(DryRunFirewall));
    }
    Ok(Arc::new(CommandFirewall::from_config(config)?))
}

/// Runs external commands such as `sudo ufw deny from {address}`.
#[derive(Debug, Clone)]
pub struct CommandFirewall {
    block_command: Vec<String>,
    unblock_command: Vec<String>,
    timeout: Duration,
}

impl CommandFirewall {
    pub fn new(
        block_command: Vec<String>,
        unblock_command: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, FirewallError> {
        if block_command.is_empty() || unblock_command.is_empty() {
            return Err(FirewallError::EmptyCommand);
        }
        Ok(Self {
            block_command,
            unblock_command,
            timeout,
        })
    }

    pub fn from_config(config: &FirewallConfig) -> Result<Self, FirewallError> {
        Self::new(
            config.block_command.clone(),
            config.unblock_command.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    async fn execute(&self, template: &[String], address: &str) -> Result<(), FirewallError> {
        let (program, args) = render_command(template, address)?;
        debug!(%program, ?args, "Running firewall command");

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(result) => result.map_err(|source| FirewallError::Launch {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(FirewallError::Timeout {
                    program,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(FirewallError::CommandFailed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlockingAction for CommandFirewall {
    async fn block(&self, address: &str) -> Result<(), FirewallError> {
        self.execute(&self.block_command, address).await?;
        info!("Blocked address: {address}");
        Ok(())
    }

    async fn unblock(&self, address: &str) -> Result<(), FirewallError> {
        self.execute(&self.unblock_command, address).await?;
        info!("Unblocked address: {address}");
        Ok(())
    }
}

/// Substitutes `address` into the template, returning program and arguments.
fn render_command(template: &[String], address: &str) -> Result<(String, Vec<String>), FirewallError> {
    let mut parts = template
        .iter()
        .map(|part| part.replace(ADDRESS_PLACEHOLDER, address));
    let program = parts.next().ok_or(FirewallError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Logs the block it would have applied and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunFirewall;

#[async_trait]
impl BlockingAction for DryRunFirewall {
    async fn block(&self, address: &str) -> Result<(), FirewallError> {
        info!("[dry-run] Would block address: {address}");
        Ok(())
    }

    async fn unblock(&self, address: &str) -> Result<(), FirewallError> {
        info!("[dry-run] Would unblock address: {address}");
        Ok(())
    }
}
