//! `git dissect checkout` — assign one candidate commit per host and check
//! it out remotely.
//!
//! The host-refs directory is wiped before the fan-out and repopulated only
//! after every remote checkout has run, so `collect` never sees assignments
//! whose checkouts were not attempted. An empty assignment means the range
//! is exhausted: the terminal line goes to the bisect log and [`Error::Done`]
//! propagates to the outermost driver.

use std::collections::BTreeMap;
use std::path::Path;

use crate::bisectlog;
use crate::error::{Error, Result};
use crate::exec::{fanout, RemoteCommand, RemoteRunner};
use crate::hostrefs;
use crate::oracle::Oracle;
use crate::select;

pub fn run(
    oracle: &dyn Oracle,
    runner: &mut dyn RemoteRunner,
    hosts: &[String],
    git_dir: &Path,
) -> Result<()> {
    let bad = oracle.tip_bad()?;
    let range = oracle.unresolved_range()?;
    let assignment = select::assign(hosts, &range, &bad);
    tracing::info!(
        "range of {} commit(s), assigning {} host(s)",
        range.len(),
        assignment.len()
    );

    let dir = hostrefs::refs_dir(git_dir);
    hostrefs::clear(&dir)?;

    if !assignment.is_empty() {
        let targets: Vec<String> = assignment.keys().cloned().collect();
        let checkouts: BTreeMap<String, String> = assignment
            .iter()
            .map(|(host, sha)| (host.clone(), format!("git checkout {sha}")))
            .collect();
        runner.connect(&targets)?;
        fanout(runner, &targets, &RemoteCommand::PerHost(checkouts))?;
    }

    hostrefs::write(&dir, &assignment)?;

    if assignment.is_empty() {
        bisectlog::append(
            git_dir,
            "first bad commit",
            &bad,
            &oracle.commit_summary(&bad)?,
        )?;
        return Err(Error::Done);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeOracle, MockRemote};
    use tempfile::TempDir;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assigns_and_persists_candidates() {
        let oracle = FakeOracle::linear(20);
        let mut mock = MockRemote::new();
        mock.set_status("h1", 0);
        mock.set_status("h2", 0);
        let tmp = TempDir::new().unwrap();

        run(&oracle, &mut mock, &hosts(&["h1", "h2"]), tmp.path()).unwrap();

        let persisted = hostrefs::read_all(&hostrefs::refs_dir(tmp.path())).unwrap();
        assert_eq!(
            persisted.keys().collect::<Vec<_>>(),
            vec!["h1", "h2"]
        );
        // Each host checked out exactly its persisted commit.
        let mut runs = mock.runs();
        runs.sort();
        for (host, command) in runs {
            assert_eq!(command, format!("git checkout {}", persisted[&host]));
        }
    }

    #[test]
    fn connects_only_assigned_hosts() {
        // Range of 3: one interior candidate survives, so one host idles.
        let oracle = FakeOracle::linear(3);
        let mut mock = MockRemote::new();
        mock.set_status("h1", 0);
        mock.set_status("h2", 0);
        mock.set_status("h3", 0);
        let tmp = TempDir::new().unwrap();

        run(&oracle, &mut mock, &hosts(&["h1", "h2", "h3"]), tmp.path()).unwrap();

        let connects = mock.connects();
        assert_eq!(connects.len(), 1);
        assert_eq!(connects[0].len(), 2);
    }

    #[test]
    fn bad_tip_is_never_assigned() {
        let oracle = FakeOracle::linear(6);
        let mut mock = MockRemote::new();
        for host in ["h1", "h2", "h3", "h4"] {
            mock.set_status(host, 0);
        }
        let tmp = TempDir::new().unwrap();

        run(&oracle, &mut mock, &hosts(&["h1", "h2", "h3", "h4"]), tmp.path()).unwrap();

        let bad = oracle.tip_bad().unwrap();
        let persisted = hostrefs::read_all(&hostrefs::refs_dir(tmp.path())).unwrap();
        assert!(persisted.values().all(|sha| sha != &bad));
    }

    #[test]
    fn exhausted_range_is_terminal() {
        let oracle = FakeOracle::linear(1);
        let mut mock = MockRemote::new();
        let tmp = TempDir::new().unwrap();

        let err = run(&oracle, &mut mock, &hosts(&["h1", "h2"]), tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Done));

        // No remote work, empty persisted assignment, terminal log line.
        assert!(mock.runs().is_empty());
        assert!(hostrefs::read_all(&hostrefs::refs_dir(tmp.path()))
            .unwrap()
            .is_empty());
        let log = std::fs::read_to_string(tmp.path().join("BISECT_LOG")).unwrap();
        assert!(log.contains("first bad commit"));
        assert!(log.contains(oracle.sha(0)));
    }

    #[test]
    fn stale_assignments_are_wiped() {
        let oracle = FakeOracle::linear(20);
        let mut mock = MockRemote::new();
        mock.set_status("h1", 0);
        let tmp = TempDir::new().unwrap();
        let dir = hostrefs::refs_dir(tmp.path());
        hostrefs::write(
            &dir,
            &BTreeMap::from([("gone-host".to_string(), "stale".to_string())]),
        )
        .unwrap();

        run(&oracle, &mut mock, &hosts(&["h1"]), tmp.path()).unwrap();

        let persisted = hostrefs::read_all(&dir).unwrap();
        assert!(!persisted.contains_key("gone-host"));
        assert!(persisted.contains_key("h1"));
    }

    #[test]
    fn connection_failure_leaves_no_assignment() {
        let oracle = FakeOracle::linear(20);
        let mut mock = MockRemote::new();
        mock.fail_with("h1", "no route to host");
        let tmp = TempDir::new().unwrap();

        let err = run(&oracle, &mut mock, &hosts(&["h1"]), tmp.path()).unwrap_err();
        assert!(!matches!(err, Error::Done));
        assert!(hostrefs::read_all(&hostrefs::refs_dir(tmp.path())).is_err());
    }

    #[test]
    fn checkout_twice_is_idempotent_while_range_unchanged() {
        let oracle = FakeOracle::linear(20);
        let mut mock = MockRemote::new();
        mock.set_status("h1", 0);
        mock.set_status("h2", 0);
        let tmp = TempDir::new().unwrap();
        let the_hosts = hosts(&["h1", "h2"]);

        run(&oracle, &mut mock, &the_hosts, tmp.path()).unwrap();
        let first = hostrefs::read_all(&hostrefs::refs_dir(tmp.path())).unwrap();

        run(&oracle, &mut mock, &the_hosts, tmp.path()).unwrap();
        let second = hostrefs::read_all(&hostrefs::refs_dir(tmp.path())).unwrap();

        assert_eq!(first, second);
    }
}
