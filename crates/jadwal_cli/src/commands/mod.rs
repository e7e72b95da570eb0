//! Subcommand implementations.

pub mod program;
pub mod vault;
