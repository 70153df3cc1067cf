//! # Portvakt Prevention Modules
//!
//! The Enforcement Mechanism seam. The monitor only sees [`BlockingAction`];
//! the default implementation shells out to a firewall manager (ufw), and a
//! dry-run implementation only logs.

pub mod firewall;

pub use firewall::{build_firewall, BlockingAction, CommandFirewall, DryRunFirewall, FirewallError};
