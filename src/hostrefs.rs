//! The persisted host→commit assignment, one file per host.
//!
//! `checkout` and `collect` can run as separate invocations, so the current
//! assignment lives on disk between them: `refs/dissect/<host>` contains the
//! assigned commit plus a newline. The directory is wiped at the start of
//! every checkout and repopulated only after the remote checkouts succeed.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub fn refs_dir(git_dir: &Path) -> PathBuf {
    git_dir.join("refs").join("dissect")
}

/// Removes the directory and everything in it. Missing is fine.
pub fn clear(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Writes one file per host with its assigned commit.
pub fn write(dir: &Path, assignment: &BTreeMap<String, String>) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (host, sha) in assignment {
        fs::write(dir.join(host), format!("{sha}\n"))?;
    }
    Ok(())
}

/// Reads the whole assignment back, keyed by host.
pub fn read_all(dir: &Path) -> Result<BTreeMap<String, String>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::config("no host assignments found; run `git dissect checkout` first")
        } else {
            e.into()
        }
    })?;
    let mut assignment = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        let host = entry.file_name().to_string_lossy().into_owned();
        let sha = fs::read_to_string(entry.path())?.trim().to_string();
        assignment.insert(host, sha);
    }
    Ok(assignment)
}
