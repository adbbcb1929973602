//! Cache of live SSH sessions, one per host.
//!
//! The pool is owned by the driving thread and only read during a fan-out;
//! sessions are inserted before any executor thread starts and removed only
//! when the pool closes. Opening and closing happen concurrently across
//! hosts on scoped threads.

use std::collections::BTreeMap;

use crate::config::DissectConfig;
use crate::error::Result;
use crate::ssh::{Endpoint, Session};

#[derive(Debug, Default)]
pub struct ConnectionPool {
    sessions: BTreeMap<String, Session>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens sessions for the hosts that do not have one yet. Hosts already
    /// connected are no-ops. Any single failure is fatal, but sessions that
    /// did come up are kept so closing tears them down cleanly.
    pub fn connect(&mut self, config: &DissectConfig, hosts: &[String]) -> Result<()> {
        let mut endpoints = Vec::new();
        for host in hosts {
            if !self.sessions.contains_key(host) {
                endpoints.push(Endpoint::resolve(config, host)?);
            }
        }
        if endpoints.is_empty() {
            return Ok(());
        }

        tracing::info!(
            "connecting {} host(s): {:?}",
            endpoints.len(),
            endpoints.iter().map(|e| e.host.as_str()).collect::<Vec<_>>()
        );

        let results: Vec<(String, Result<Session>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = endpoints
                .iter()
                .map(|endpoint| {
                    (
                        endpoint.host.clone(),
                        scope.spawn(move || Session::connect(endpoint)),
                    )
                })
                .collect();
            handles
                .into_iter()
                .map(|(host, handle)| (host, handle.join().expect("connect thread panicked")))
                .collect()
        });

        let mut first_error = None;
        for (host, result) in results {
            match result {
                Ok(session) => {
                    self.sessions.insert(host, session);
                }
                Err(error) => {
                    tracing::debug!("connection to {host} failed: {error}");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn get(&self, host: &str) -> Option<&Session> {
        self.sessions.get(host)
    }

    /// Closes every session concurrently and empties the cache.
    pub fn close(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        if sessions.is_empty() {
            return;
        }
        std::thread::scope(|scope| {
            for session in sessions.values() {
                scope.spawn(move || session.close());
            }
        });
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}
