//! `git dissect step` — one full round: `checkout` then `collect`.
//!
//! Checkout is a barrier: every host's checkout completes before any host's
//! test command starts, because the two fan-outs are separate.

use std::path::Path;

use crate::commands::{checkout, collect};
use crate::error::Result;
use crate::exec::RemoteRunner;
use crate::oracle::Oracle;

pub fn run(
    oracle: &dyn Oracle,
    runner: &mut dyn RemoteRunner,
    hosts: &[String],
    git_dir: &Path,
    cmd: &[String],
) -> Result<()> {
    checkout::run(oracle, runner, hosts, git_dir)?;
    collect::run(oracle, runner, git_dir, cmd)
}
