//! Remote command execution with per-host output banners, and the fan-out
//! scheduler that runs one command per host concurrently.
//!
//! All orchestration code talks to [`RemoteRunner`] rather than spawning ssh
//! directly, so command sequences can be unit-tested with
//! [`MockRemote`](crate::test_support::MockRemote) without a real fleet.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::process::Stdio;

use shell_quote::{Bash, QuoteRefExt};

use crate::config::DissectConfig;
use crate::error::{Error, Result};
use crate::pool::ConnectionPool;

/// What a fan-out runs: the same command everywhere, or one per host.
#[derive(Debug, Clone)]
pub enum RemoteCommand {
    Uniform(String),
    PerHost(BTreeMap<String, String>),
}

impl RemoteCommand {
    fn for_host(&self, host: &str) -> Option<&str> {
        match self {
            RemoteCommand::Uniform(command) => Some(command),
            RemoteCommand::PerHost(commands) => commands.get(host).map(String::as_str),
        }
    }
}

/// `[<host>] <prefix>:` — the tag in front of every streamed line.
pub fn banner(host: &str, prefix: &str) -> String {
    format!("[{host}] {prefix}:")
}

/// Abstraction over running a command on a named host.
///
/// `run` returns the remote exit status without interpreting it; callers
/// decide what a nonzero status means. Implementations must be `Sync`
/// because the fan-out invokes `run` from one thread per host.
pub trait RemoteRunner: Sync {
    /// Ensures live sessions exist for `hosts`. Fatal on any failure.
    fn connect(&mut self, hosts: &[String]) -> Result<()>;

    /// Runs `command` in the host's configured working directory, streaming
    /// output with banners, and returns the exit status.
    fn run(&self, host: &str, command: &str) -> Result<i32>;
}

/// The real [`RemoteRunner`]: a connection pool plus the host table.
pub struct SshRunner {
    config: DissectConfig,
    pool: ConnectionPool,
}

impl SshRunner {
    pub fn new(config: DissectConfig) -> Self {
        SshRunner {
            config,
            pool: ConnectionPool::new(),
        }
    }

    /// Releases every session. Also happens when the runner is dropped.
    pub fn close(&mut self) {
        self.pool.close();
    }
}

impl RemoteRunner for SshRunner {
    fn connect(&mut self, hosts: &[String]) -> Result<()> {
        self.pool.connect(&self.config, hosts)
    }

    fn run(&self, host: &str, command: &str) -> Result<i32> {
        let session = self.pool.get(host).ok_or_else(|| Error::Connection {
            host: host.to_string(),
            message: "no live session (connect first)".to_string(),
        })?;
        let path: String = self.config.path(host)?.quoted(Bash);
        let command = format!("cd {path}; {command}");

        println!("{} {:?}", banner(host, "exec"), command);
        let mut child = session
            .command(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::RemoteExec {
                host: host.to_string(),
                message: e.to_string(),
            })?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        // One reader per pipe keeps each stream's lines in worker order.
        std::thread::scope(|scope| {
            scope.spawn(|| stream_lines(stderr, host, "err"));
            stream_lines(stdout, host, "out");
        });

        let status = child.wait().map_err(|e| Error::RemoteExec {
            host: host.to_string(),
            message: e.to_string(),
        })?;
        let code = status.code().ok_or_else(|| Error::RemoteExec {
            host: host.to_string(),
            message: "ssh terminated by signal".to_string(),
        })?;
        println!("{} {}", banner(host, "ret"), code);

        // 255 is how ssh reports a transport failure. Aborting here keeps a
        // dead connection from being recorded as a bad verdict.
        if code == 255 {
            return Err(Error::Connection {
                host: host.to_string(),
                message: "ssh exited 255 (connection failure)".to_string(),
            });
        }
        Ok(code)
    }
}

fn stream_lines(pipe: impl Read, host: &str, prefix: &str) {
    let reader = BufReader::new(pipe);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        println!("{} {}", banner(host, prefix), line);
    }
}

/// Runs `command` on every host concurrently and gathers the exit statuses.
///
/// Returns only after every per-host invocation has terminated; the first
/// per-host error (if any) is then propagated.
pub fn fanout(
    runner: &dyn RemoteRunner,
    hosts: &[String],
    command: &RemoteCommand,
) -> Result<BTreeMap<String, i32>> {
    let results: Vec<(String, Result<i32>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = hosts
            .iter()
            .map(|host| {
                let handle = scope.spawn(move || match command.for_host(host) {
                    Some(cmd) => runner.run(host, cmd),
                    None => Err(Error::RemoteExec {
                        host: host.clone(),
                        message: "no command assigned".to_string(),
                    }),
                });
                (host.clone(), handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(host, handle)| (host, handle.join().expect("fan-out thread panicked")))
            .collect()
    });

    let mut statuses = BTreeMap::new();
    for (host, result) in results {
        statuses.insert(host, result?);
    }
    Ok(statuses)
}
