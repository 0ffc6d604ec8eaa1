//! `simctl`: a non-interactive command surface over the Chord ring
//! simulation in `corelib`. One subcommand per invocation, no prompt loop,
//! no persisted state between runs.

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
