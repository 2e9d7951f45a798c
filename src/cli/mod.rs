//! Command-line interface for fix-forge.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands, RunArgs};
