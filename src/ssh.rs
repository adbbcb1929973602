//! One live SSH session per host, multiplexed over OpenSSH's `ControlMaster`.
//!
//! [`Session::connect`] spawns `ssh -M -f -N` with a control socket in a
//! private temp directory and waits for the forked master to authenticate.
//! Subsequent commands reuse the authenticated connection through `-S`, so
//! per-command startup cost is a local socket handshake, not a new login.
//! Closing the session asks the master to exit, which also severs any
//! in-flight remote commands.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::DissectConfig;
use crate::error::{Error, Result};

/// Endpoint parameters for one host, fully resolved from configuration.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub strict_host_key_checking: bool,
    pub proxy_command: Option<String>,
    pub use_ssh_config: bool,
}

impl Endpoint {
    pub fn resolve(config: &DissectConfig, host: &str) -> Result<Self> {
        Ok(Endpoint {
            host: host.to_string(),
            hostname: config.hostname(host)?,
            port: config.port(host)?,
            username: config.username(host)?,
            strict_host_key_checking: config.strict_host_key_checking(host)?,
            proxy_command: config.proxy_command(host)?,
            use_ssh_config: config.use_ssh_config(),
        })
    }

    /// Substitutes `%h`, `%p`, `%r` in the tunnel template with the resolved
    /// hostname, port, and username.
    fn expanded_proxy_command(&self) -> Option<String> {
        self.proxy_command.as_ref().map(|template| {
            template
                .replace("%h", &self.hostname)
                .replace("%p", &self.port.to_string())
                .replace("%r", &self.username)
        })
    }
}

/// Arguments that establish the master connection.
fn master_args(endpoint: &Endpoint, ctl: &Path) -> Vec<String> {
    let mut args = vec![
        "-S".to_string(),
        ctl.display().to_string(),
        "-M".to_string(),
        "-f".to_string(),
        "-N".to_string(),
        "-o".to_string(),
        "ControlPersist=yes".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!(
            "StrictHostKeyChecking={}",
            if endpoint.strict_host_key_checking {
                "yes"
            } else {
                "no"
            }
        ),
    ];
    if !endpoint.use_ssh_config {
        args.push("-F".to_string());
        args.push("/dev/null".to_string());
    }
    if let Some(proxy) = endpoint.expanded_proxy_command() {
        args.push("-o".to_string());
        args.push(format!("ProxyCommand={proxy}"));
    }
    args.push("-p".to_string());
    args.push(endpoint.port.to_string());
    args.push("-l".to_string());
    args.push(endpoint.username.clone());
    args.push(endpoint.hostname.clone());
    args
}

/// Arguments that run one remote command over an established master.
fn command_args(ctl: &Path, hostname: &str, remote_command: &str) -> Vec<String> {
    vec![
        "-S".to_string(),
        ctl.display().to_string(),
        "-T".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        // The discard port: if the master has died, fail fast instead of
        // opening a fresh connection to the real endpoint.
        "-p".to_string(),
        "9".to_string(),
        hostname.to_string(),
        "--".to_string(),
        remote_command.to_string(),
    ]
}

/// A live authenticated SSH session to one host.
pub struct Session {
    host: String,
    hostname: String,
    ctl: tempfile::TempDir,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("hostname", &self.hostname)
            .finish()
    }
}

impl Session {
    /// Establishes and authenticates the master connection.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let ctl = tempfile::Builder::new()
            .prefix(".dissect-ssh-")
            .tempdir()
            .map_err(|e| Error::Connection {
                host: endpoint.host.clone(),
                message: format!("cannot create control directory: {e}"),
            })?;
        let ctl_path = ctl.path().join("master");

        tracing::debug!(
            "connecting to {} ({}@{}:{})",
            endpoint.host,
            endpoint.username,
            endpoint.hostname,
            endpoint.port
        );

        // With -f the client forks once the connection is up, so waiting on
        // the spawned process is waiting for authentication to finish.
        let mut child = Command::new("ssh")
            .args(master_args(endpoint, &ctl_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Connection {
                host: endpoint.host.clone(),
                message: format!("cannot spawn ssh: {e}"),
            })?;
        let status = child.wait().map_err(|e| Error::Connection {
            host: endpoint.host.clone(),
            message: e.to_string(),
        })?;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(pipe) = child.stderr.as_mut() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(Error::Connection {
                host: endpoint.host.clone(),
                message: if stderr.trim().is_empty() {
                    format!("ssh exited with {status}")
                } else {
                    stderr.trim().to_string()
                },
            });
        }

        Ok(Session {
            host: endpoint.host.clone(),
            hostname: endpoint.hostname.clone(),
            ctl,
            closed: AtomicBool::new(false),
        })
    }

    fn ctl_path(&self) -> PathBuf {
        self.ctl.path().join("master")
    }

    /// A `Command` that runs `remote_command` over this session. The caller
    /// decides what to do with the standard streams.
    pub fn command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(command_args(&self.ctl_path(), &self.hostname, remote_command));
        cmd
    }

    /// Asks the master to exit. Idempotent; also invoked on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("closing session to {}", self.host);
        let _ = Command::new("ssh")
            .arg("-S")
            .arg(self.ctl_path())
            .args(["-O", "exit", "-o", "BatchMode=yes"])
            .arg(&self.hostname)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
