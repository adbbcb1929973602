//! CLI argument definitions using clap's derive API.
//!
//! This module defines the full command tree. Every subcommand and flag is
//! declared here; the rest of the codebase receives already-parsed structs.

use clap::{Parser, Subcommand, ValueEnum};

/// Distributed git bisect: test many candidate commits at once, one per host.
#[derive(Debug, Parser)]
#[command(name = "git-dissect", version)]
pub struct Cli {
    /// Increase log verbosity (-v = INFO, -vv = DEBUG, -vvv = TRACE).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Maps the verbosity count to a tracing filter level.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run `git fetch` on every configured host.
    Fetch,

    /// Assign one candidate commit per host and check it out remotely.
    Checkout,

    /// Run a command on every configured host (no bisect interaction).
    Execute {
        /// Command to run; empty means `git dissect signal wait`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Run the test command per assigned host and apply the verdicts.
    Collect {
        /// Command to run; empty means `git dissect signal wait`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// One round: `checkout` then `collect`.
    Step {
        /// Command to run; empty means `git dissect signal wait`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Loop `step` until the suspect range is exhausted.
    Run {
        /// Command to run; empty means `git dissect signal wait`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Report or await an interactive verdict on a worker.
    Signal {
        #[arg(value_enum)]
        action: SignalAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignalAction {
    /// Send a good verdict to the waiting test process.
    Good,
    /// Send a bad verdict to the waiting test process.
    Bad,
    /// Block until a verdict arrives, then exit with it.
    Wait,
}
