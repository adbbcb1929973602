//! Candidate selection: evenly spaced interior points of the suspect range.
//!
//! With N hosts and an unresolved range of length L (rev-list order,
//! descending from the bad tip), the selector picks the commits at indices
//! `⌊L·(i+1)/(N+1)⌋`, drops duplicates and the bad tip itself, and pairs
//! sorted hosts with sorted commits. Sorting both sides makes the assignment
//! deterministic for a given range and host set.

use std::collections::{BTreeMap, BTreeSet};

/// Pairs hosts with candidate commits. An empty result means there is
/// nothing left to test: the bad tip is the answer.
pub fn assign(hosts: &[String], range: &[String], bad: &str) -> BTreeMap<String, String> {
    if hosts.is_empty() || range.is_empty() {
        return BTreeMap::new();
    }

    let mut picked = BTreeSet::new();
    for i in 0..hosts.len() {
        let index = range.len() * (i + 1) / (hosts.len() + 1);
        picked.insert(range[index].clone());
    }
    // The bad tip's verdict is already known; don't waste a worker on it.
    picked.remove(bad);

    let mut sorted_hosts: Vec<&String> = hosts.iter().collect();
    sorted_hosts.sort();
    sorted_hosts
        .into_iter()
        .cloned()
        .zip(picked)
        .collect()
}
