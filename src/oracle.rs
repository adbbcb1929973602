//! The bisect oracle: a thin adapter over the repository's native bisect
//! bookkeeping.
//!
//! The controller never inspects the commit graph itself; everything it
//! knows about the range comes through [`Oracle`]. The real implementation
//! shells out to `git`, which owns correctness of the ancestor relation and
//! of verdict bookkeeping.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// A good/bad label derived from a test command's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Bad,
}

impl Verdict {
    /// Local bisect convention: exit 0 is good, anything else is bad.
    pub fn from_exit_status(status: i32) -> Self {
        if status == 0 {
            Verdict::Good
        } else {
            Verdict::Bad
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Good => "good",
            Verdict::Bad => "bad",
        }
    }

    /// The one-byte wire form used by the signal rendezvous.
    pub fn byte(self) -> u8 {
        match self {
            Verdict::Good => 0,
            Verdict::Bad => 1,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operations the round driver needs from the repository.
///
/// All synchronous, all assumed correct; no caching is layered on top, so
/// every call observes the current bisect state.
pub trait Oracle {
    /// The current `refs/bisect/bad` tip.
    fn tip_bad(&self) -> Result<String>;

    /// All commits recorded as good (`refs/bisect/good-*`).
    fn goods(&self) -> Result<Vec<String>>;

    /// Commits reachable from bad excluding ancestors of any good, in
    /// native rev-list order (descending from bad).
    fn unresolved_range(&self) -> Result<Vec<String>>;

    fn is_ancestor(&self, commit: &str, bad: &str) -> Result<bool>;

    /// Records a verdict through native `git bisect`.
    fn mark(&self, commit: &str, verdict: Verdict) -> Result<()>;

    /// The commit's subject line, for log output.
    fn commit_summary(&self, commit: &str) -> Result<String>;
}

/// [`Oracle`] implementation over the `git` binary.
#[derive(Debug, Clone)]
pub struct GitOracle {
    repo_dir: PathBuf,
    git_dir: PathBuf,
}

impl GitOracle {
    /// Opens the repository containing the current directory.
    pub fn discover() -> Result<Self> {
        Self::open(&std::env::current_dir()?)
    }

    /// Opens the repository containing `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["rev-parse", "--absolute-git-dir"])
            .output()
            .map_err(|e| Error::Oracle {
                command: "rev-parse".to_string(),
                message: format!("cannot run git: {e}"),
            })?;
        if !output.status.success() {
            return Err(Error::Oracle {
                command: "rev-parse".to_string(),
                message: format!(
                    "{} (not inside a git repository?)",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let git_dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        Ok(GitOracle {
            repo_dir: dir.to_path_buf(),
            git_dir,
        })
    }

    /// The repository metadata directory; dissect state lives under it.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        tracing::trace!("git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|e| Error::Oracle {
                command: args.join(" "),
                message: format!("cannot run git: {e}"),
            })?;
        if !output.status.success() {
            return Err(Error::Oracle {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Oracle for GitOracle {
    fn tip_bad(&self) -> Result<String> {
        self.git(&["rev-parse", "--verify", "refs/bisect/bad"])
            .map(|out| out.trim().to_string())
            .map_err(|e| match e {
                Error::Oracle { command, message } => Error::Oracle {
                    command,
                    message: format!("{message} (is a bisect in progress?)"),
                },
                other => other,
            })
    }

    fn goods(&self) -> Result<Vec<String>> {
        let out = self.git(&[
            "for-each-ref",
            "--format=%(refname)",
            "refs/bisect/good-*",
        ])?;
        Ok(out
            .lines()
            .filter_map(|line| line.strip_prefix("refs/bisect/good-"))
            .map(str::to_string)
            .collect())
    }

    fn unresolved_range(&self) -> Result<Vec<String>> {
        let bad = self.tip_bad()?;
        let goods = self.goods()?;
        let mut args = vec!["rev-list", bad.as_str(), "--not"];
        args.extend(goods.iter().map(String::as_str));
        let out = self.git(&args)?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn is_ancestor(&self, commit: &str, bad: &str) -> Result<bool> {
        let status = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(["merge-base", "--is-ancestor", commit, bad])
            .status()
            .map_err(|e| Error::Oracle {
                command: "merge-base --is-ancestor".to_string(),
                message: format!("cannot run git: {e}"),
            })?;
        match status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::Oracle {
                command: "merge-base --is-ancestor".to_string(),
                message: format!("unexpected exit: {status}"),
            }),
        }
    }

    fn mark(&self, commit: &str, verdict: Verdict) -> Result<()> {
        self.git(&["bisect", verdict.as_str(), commit])?;
        Ok(())
    }

    fn commit_summary(&self, commit: &str) -> Result<String> {
        self.git(&["log", "-1", "--format=%s", commit])
            .map(|out| out.trim().to_string())
    }
}
