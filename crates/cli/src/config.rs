//! Top-level argument parsing and the process entry point's `run`.

use clap::Parser;

use corelib::{IdSpace, RingManager};

use crate::commands::Command;

/// Run a single Chord ring operation and exit.
///
/// Each invocation starts from an empty ring — there is no persistence
/// across process runs — so `join`/`put`/`lookup` standing alone only
/// demonstrate argument handling and error reporting. `demo` is the
/// subcommand that actually exercises the ring end to end in one run.
#[derive(Parser, Debug)]
#[command(name = "simctl", version, about = "Chord ring simulation control")]
pub struct CliConfig {
    /// Number of bits in the ring's identifier space (N = 2^bits).
    #[arg(long, default_value_t = corelib::id::DEFAULT_M, global = true)]
    pub bits: u32,

    /// Emit machine-readable JSON instead of a human-readable summary.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(&self) -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init()
            .ok();

        let registry = RingManager::new(IdSpace::new(self.bits));
        self.command.execute(&registry, self.json)
    }
}
