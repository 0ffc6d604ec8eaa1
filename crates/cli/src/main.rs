//! CLI entry point for the Chord ring simulation.

use clap::Parser;
use simctl::CliConfig;

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    config.run()
}
