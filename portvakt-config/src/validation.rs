// portvakt-config/src/validation.rs
//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use ipnetwork::IpNetwork;
use validator::ValidationError;

use crate::prevention::ADDRESS_PLACEHOLDER;

/// Validate that the provided CIDR list does not contain any invalid ranges.
pub fn validate_cidr_list(cidrs: &[IpNetwork]) -> Result<(), ValidationError> {
    if cidrs.iter().any(|n| match n {
        IpNetwork::V4(net) => net.ip().octets() == [0, 0, 0, 0],
        IpNetwork::V6(net) => net.ip().is_unspecified(),
    }) {
        return Err(ValidationError::new("invalid_cidr"));
    }
    Ok(())
}

/// Validate that an interface name follows Linux naming conventions.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty() && name.len() <= 15;

    let re = regex::Regex::new(r"^[a-zA-Z0-9_.\-]+$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;

    if valid && re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate a firewall command template: a program followed by arguments,
/// one of which carries the address placeholder.
pub fn validate_command_template(command: &[String]) -> Result<(), ValidationError> {
    match command.first() {
        None => Err(ValidationError::new("empty_command")),
        Some(program) if program.trim().is_empty() => Err(ValidationError::new("empty_command")),
        Some(_) if !command.iter().any(|arg| arg.contains(ADDRESS_PLACEHOLDER)) => {
            Err(ValidationError::new("missing_address_placeholder"))
        }
        Some(_) => Ok(()),
    }
}

/// Validate log level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
