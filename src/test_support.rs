//! Test doubles shared across unit tests and integration tests.
//!
//! [`MockRemote`] is a fake [`RemoteRunner`] with canned per-host exit
//! statuses and recorded invocations. [`FakeOracle`] simulates bisect state
//! over a linear history. [`VerdictRemote`] answers the test command from a
//! known first-bad threshold, which lets whole-driver tests converge like a
//! real fleet would. All three are thread-safe because the fan-out calls
//! runners from one thread per host.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::exec::RemoteRunner;
use crate::oracle::{Oracle, Verdict};

/// Canned behavior for one host.
enum MockBehavior {
    Status(i32),
    Fail(String),
}

/// A fake [`RemoteRunner`] with per-host canned results.
///
/// Unlike a response queue, statuses are keyed by host so tests stay
/// deterministic regardless of fan-out thread interleaving. Calling `run`
/// for a host with no canned behavior panics.
#[derive(Default)]
pub struct MockRemote {
    behaviors: Mutex<BTreeMap<String, MockBehavior>>,
    connects: Mutex<Vec<Vec<String>>>,
    runs: Mutex<Vec<(String, String)>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host's command will appear to exit with `status`.
    pub fn set_status(&self, host: &str, status: i32) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(host.to_string(), MockBehavior::Status(status));
    }

    /// The host's command will fail to run at all.
    pub fn fail_with(&self, host: &str, message: &str) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(host.to_string(), MockBehavior::Fail(message.to_string()));
    }

    /// Host lists passed to `connect`, in call order.
    pub fn connects(&self) -> Vec<Vec<String>> {
        self.connects.lock().unwrap().clone()
    }

    /// `(host, command)` pairs passed to `run`. Fan-out order is not
    /// deterministic across hosts; sort before asserting sequences.
    pub fn runs(&self) -> Vec<(String, String)> {
        self.runs.lock().unwrap().clone()
    }
}

impl RemoteRunner for MockRemote {
    fn connect(&mut self, hosts: &[String]) -> Result<()> {
        self.connects.lock().unwrap().push(hosts.to_vec());
        Ok(())
    }

    fn run(&self, host: &str, command: &str) -> Result<i32> {
        self.runs
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));
        match self.behaviors.lock().unwrap().get(host) {
            Some(MockBehavior::Status(status)) => Ok(*status),
            Some(MockBehavior::Fail(message)) => Err(Error::RemoteExec {
                host: host.to_string(),
                message: message.clone(),
            }),
            None => panic!("MockRemote: no behavior for host {host} (use set_status)"),
        }
    }
}

/// An [`Oracle`] over a synthetic linear history.
///
/// Commits are indexed oldest-first; the last commit starts as the bad tip.
/// `is_ancestor` is the index order, `mark` moves the bad tip or records a
/// good, and `unresolved_range` is recomputed from both, so driver tests
/// observe the same narrowing a real repository would show.
pub struct FakeOracle {
    history: Vec<String>,
    bad: Mutex<usize>,
    goods: Mutex<Vec<usize>>,
    marks: Mutex<Vec<(String, Verdict)>>,
}

impl FakeOracle {
    /// A linear history of `len` commits with the newest as bad tip.
    pub fn linear(len: usize) -> Self {
        assert!(len > 0);
        FakeOracle {
            history: (0..len).map(|i| format!("{i:040x}")).collect(),
            bad: Mutex::new(len - 1),
            goods: Mutex::new(Vec::new()),
            marks: Mutex::new(Vec::new()),
        }
    }

    pub fn sha(&self, index: usize) -> &str {
        &self.history[index]
    }

    pub fn bad_index(&self) -> usize {
        *self.bad.lock().unwrap()
    }

    /// Every `mark` call, in order.
    pub fn marks(&self) -> Vec<(String, Verdict)> {
        self.marks.lock().unwrap().clone()
    }

    fn index_of(&self, sha: &str) -> Result<usize> {
        self.history
            .iter()
            .position(|s| s == sha)
            .ok_or_else(|| Error::Oracle {
                command: "rev-parse".to_string(),
                message: format!("unknown commit {sha}"),
            })
    }
}

impl Oracle for FakeOracle {
    fn tip_bad(&self) -> Result<String> {
        Ok(self.history[self.bad_index()].clone())
    }

    fn goods(&self) -> Result<Vec<String>> {
        Ok(self
            .goods
            .lock()
            .unwrap()
            .iter()
            .map(|&i| self.history[i].clone())
            .collect())
    }

    fn unresolved_range(&self) -> Result<Vec<String>> {
        let bad = self.bad_index();
        // Ancestors of any good are resolved; on a line that is everything
        // at or below the highest good.
        let floor = self
            .goods
            .lock()
            .unwrap()
            .iter()
            .copied()
            .max()
            .map(|g| g + 1)
            .unwrap_or(0);
        if floor > bad {
            return Ok(Vec::new());
        }
        Ok((floor..=bad).rev().map(|i| self.history[i].clone()).collect())
    }

    fn is_ancestor(&self, commit: &str, bad: &str) -> Result<bool> {
        Ok(self.index_of(commit)? <= self.index_of(bad)?)
    }

    fn mark(&self, commit: &str, verdict: Verdict) -> Result<()> {
        let index = self.index_of(commit)?;
        self.marks
            .lock()
            .unwrap()
            .push((commit.to_string(), verdict));
        match verdict {
            Verdict::Good => self.goods.lock().unwrap().push(index),
            Verdict::Bad => *self.bad.lock().unwrap() = index,
        }
        Ok(())
    }

    fn commit_summary(&self, commit: &str) -> Result<String> {
        let index = self.index_of(commit)?;
        Ok(format!("commit #{index}"))
    }
}

/// A [`RemoteRunner`] that decides verdicts from a first-bad threshold.
///
/// Checkout commands succeed; anything else is treated as the test command
/// and answered by looking up the host's assigned commit in the host-refs
/// directory: commits at or above `first_bad` (oldest-first index) exit 1,
/// older commits exit 0.
pub struct VerdictRemote {
    history: Vec<String>,
    first_bad: usize,
    refs_dir: PathBuf,
}

impl VerdictRemote {
    pub fn new(oracle: &FakeOracle, first_bad: usize, refs_dir: PathBuf) -> Self {
        VerdictRemote {
            history: oracle.history.clone(),
            first_bad,
            refs_dir,
        }
    }

    /// Same, but over an explicit sha list (for real-git tests).
    pub fn with_history(history: Vec<String>, first_bad: usize, refs_dir: PathBuf) -> Self {
        VerdictRemote {
            history,
            first_bad,
            refs_dir,
        }
    }
}

impl RemoteRunner for VerdictRemote {
    fn connect(&mut self, _hosts: &[String]) -> Result<()> {
        Ok(())
    }

    fn run(&self, host: &str, command: &str) -> Result<i32> {
        if command.starts_with("git checkout ") || command == "git fetch" {
            return Ok(0);
        }
        let sha = std::fs::read_to_string(self.refs_dir.join(host))?
            .trim()
            .to_string();
        let index = self
            .history
            .iter()
            .position(|s| s == &sha)
            .ok_or_else(|| Error::RemoteExec {
                host: host.to_string(),
                message: format!("unknown commit {sha}"),
            })?;
        Ok(i32::from(index >= self.first_bad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_oracle_initial_state() {
        let oracle = FakeOracle::linear(5);
        assert_eq!(oracle.tip_bad().unwrap(), oracle.sha(4));
        assert!(oracle.goods().unwrap().is_empty());
        // Descending from bad.
        assert_eq!(
            oracle.unresolved_range().unwrap(),
            vec![
                oracle.sha(4).to_string(),
                oracle.sha(3).to_string(),
                oracle.sha(2).to_string(),
                oracle.sha(1).to_string(),
                oracle.sha(0).to_string(),
            ]
        );
    }

    #[test]
    fn fake_oracle_good_narrows_from_below() {
        let oracle = FakeOracle::linear(5);
        oracle.mark(oracle.sha(1), Verdict::Good).unwrap();
        assert_eq!(
            oracle.unresolved_range().unwrap(),
            vec![
                oracle.sha(4).to_string(),
                oracle.sha(3).to_string(),
                oracle.sha(2).to_string(),
            ]
        );
    }

    #[test]
    fn fake_oracle_bad_narrows_from_above() {
        let oracle = FakeOracle::linear(5);
        oracle.mark(oracle.sha(2), Verdict::Bad).unwrap();
        assert_eq!(oracle.bad_index(), 2);
        assert_eq!(oracle.unresolved_range().unwrap().len(), 3);
    }

    #[test]
    fn fake_oracle_ancestor_is_index_order() {
        let oracle = FakeOracle::linear(5);
        assert!(oracle.is_ancestor(oracle.sha(1), oracle.sha(3)).unwrap());
        assert!(!oracle.is_ancestor(oracle.sha(3), oracle.sha(1)).unwrap());
        assert!(oracle.is_ancestor(oracle.sha(2), oracle.sha(2)).unwrap());
    }

    #[test]
    fn fake_oracle_exhausted_range() {
        let oracle = FakeOracle::linear(3);
        oracle.mark(oracle.sha(0), Verdict::Bad).unwrap();
        oracle.mark(oracle.sha(1), Verdict::Good).unwrap();
        assert!(oracle.unresolved_range().unwrap().is_empty());
    }

    #[test]
    fn mock_remote_records_runs() {
        let mock = MockRemote::new();
        mock.set_status("a", 7);
        assert_eq!(mock.run("a", "true").unwrap(), 7);
        assert_eq!(mock.runs(), vec![("a".to_string(), "true".to_string())]);
    }

    #[test]
    #[should_panic(expected = "no behavior")]
    fn mock_remote_panics_without_behavior() {
        let mock = MockRemote::new();
        let _ = mock.run("a", "true");
    }
}
