//! `git dissect fetch` — run `git fetch` on every configured host.

use crate::error::Result;
use crate::exec::{fanout, RemoteCommand, RemoteRunner};

pub fn run(runner: &mut dyn RemoteRunner, hosts: &[String]) -> Result<()> {
    runner.connect(hosts)?;
    fanout(
        runner,
        hosts,
        &RemoteCommand::Uniform("git fetch".to_string()),
    )?;
    Ok(())
}
