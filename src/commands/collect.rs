//! `git dissect collect` — run the test command per assigned host and fold
//! the verdicts into the local bisect.
//!
//! The bad tip is re-read before each application: a verdict applied earlier
//! in the same pass can tighten the range, and any assignment that fell out
//! of it is dropped, never retried. Transport-level failures abort before
//! any verdict is recorded.

use std::path::Path;

use crate::bisectlog;
use crate::commands::execute;
use crate::error::Result;
use crate::exec::RemoteRunner;
use crate::hostrefs;
use crate::oracle::{Oracle, Verdict};

pub fn run(
    oracle: &dyn Oracle,
    runner: &mut dyn RemoteRunner,
    git_dir: &Path,
    cmd: &[String],
) -> Result<()> {
    let dir = hostrefs::refs_dir(git_dir);
    let assignment = hostrefs::read_all(&dir)?;
    let hosts: Vec<String> = assignment.keys().cloned().collect();

    let results = execute::run(runner, &hosts, cmd)?;

    for (host, sha) in &assignment {
        let Some(&status) = results.get(host) else {
            continue;
        };
        let bad = oracle.tip_bad()?;
        if oracle.is_ancestor(sha, &bad)? {
            let verdict = Verdict::from_exit_status(status);
            tracing::info!("{host}: {sha} is {verdict} (exit {status})");
            bisectlog::append(git_dir, verdict.as_str(), sha, &oracle.commit_summary(sha)?)?;
            oracle.mark(sha, verdict)?;
        } else {
            println!("{sha} is no longer an ancestor of {bad}. skipping it");
        }
    }
    Ok(())
}
