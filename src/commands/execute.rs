//! `git dissect execute` — fan a command out to hosts, no bisect interaction.
//!
//! Also the shared fan-out entry used by `collect`: an empty command means
//! the interactive rendezvous, where the remote test process is
//! `git dissect signal wait` and a human reports the verdict.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::exec::{fanout, RemoteCommand, RemoteRunner};

/// Substituted when no test command is given.
pub const SIGNAL_WAIT: &str = "git dissect signal wait";

/// Joins the command words, or falls back to the rendezvous command.
pub fn command_or_default(cmd: &[String]) -> String {
    if cmd.is_empty() {
        SIGNAL_WAIT.to_string()
    } else {
        cmd.join(" ")
    }
}

/// Runs the command on every host and returns the exit statuses.
pub fn run(
    runner: &mut dyn RemoteRunner,
    hosts: &[String],
    cmd: &[String],
) -> Result<BTreeMap<String, i32>> {
    let command = command_or_default(cmd);
    runner.connect(hosts)?;
    fanout(runner, hosts, &RemoteCommand::Uniform(command))
}
