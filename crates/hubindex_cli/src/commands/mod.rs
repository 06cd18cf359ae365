//! CLI command implementations.
//!
//! Every command works on one endpoint and touches each of its logical
//! indices in turn.

pub mod clear;
pub mod ensure;
pub mod prune;
pub mod rebuild;
pub mod status;
pub mod teardown;

/// Result type shared by the commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
