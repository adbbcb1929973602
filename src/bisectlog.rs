//! Summary comments appended to git's bisect log.
//!
//! Native `git bisect` records its own replayable `git bisect <verdict>`
//! lines in `BISECT_LOG`; the driver adds a comment per applied verdict so
//! the log also reads as a narrative of the distributed search.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

pub fn append(git_dir: &Path, prefix: &str, sha: &str, summary: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(git_dir.join("BISECT_LOG"))?;
    writeln!(file, "# {prefix}: [{sha}] {summary}")?;
    Ok(())
}
