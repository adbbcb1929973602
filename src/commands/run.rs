//! `git dissect run` — loop rounds until the suspect range is exhausted.
//!
//! The loop has no exit of its own: it ends when `checkout` raises the
//! terminal condition (or a real error), which the caller handles.

use std::path::Path;

use crate::commands::step;
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
    loop {
        step::run(oracle, runner, hosts, git_dir, cmd)?;
    }
}
