//! Host configuration from the repository's native git config.
//!
//! Hosts are declared in sections named `dissect "<host>"`. A host takes part
//! in a round only if `enabled` is true (default) and `path` (the remote
//! working directory) is set. Every other key is resolved through a chain:
//! repo config first, then the OS SSH client config (unless the top-level
//! `dissect.usesshconfig` is false), then a built-in default. Keys starting
//! with `_` are private metadata and ignored.

use std::collections::BTreeMap;
use std::process::Command;

use crate::error::{Error, Result};
use crate::sshconfig::SshConfig;

const SECTION: &str = "dissect";

/// Raw per-host key/value pairs as git reported them (keys come lowercased).
#[derive(Debug, Clone, Default)]
struct HostEntry {
    values: BTreeMap<String, String>,
}

/// The loaded host table plus the SSH-config fallback source.
///
/// Immutable after load; resolution methods borrow only.
#[derive(Debug, Clone, Default)]
pub struct DissectConfig {
    hosts: BTreeMap<String, HostEntry>,
    use_ssh_config: bool,
    ssh_config: SshConfig,
}

/// Expected type of a resolved value. Carried explicitly so each source can
/// apply its own coercion rules instead of guessing from the default.
#[derive(Debug, Clone, Copy)]
enum Expected {
    Bool,
    Int,
    Str,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl DissectConfig {
    /// Reads the repository config and, if enabled, the OS SSH config.
    pub fn load() -> Result<Self> {
        let mut config = Self::parse(&git_config_list()?)?;
        if config.use_ssh_config {
            config = config.with_ssh_config(SshConfig::load_system());
        }
        tracing::info!("configured hosts: {:?}", config.hosts().collect::<Vec<_>>());
        Ok(config)
    }

    /// Parses the `--null`-separated output of `git config --list`.
    ///
    /// Entries are `key\nvalue` pairs; a key with no newline is a valueless
    /// boolean (true, per git semantics).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut hosts: BTreeMap<String, HostEntry> = BTreeMap::new();
        let mut use_ssh_config = true;

        for entry in raw.split('\0') {
            if entry.is_empty() {
                continue;
            }
            let (key, value) = match entry.split_once('\n') {
                Some((key, value)) => (key, value),
                None => (entry, "true"),
            };
            let Some(rest) = key.strip_prefix(&format!("{SECTION}.")) else {
                continue;
            };
            match rest.rsplit_once('.') {
                // Host names may contain dots; the final component is the
                // key, which git has already lowercased.
                Some((host, key)) => {
                    if key.starts_with('_') {
                        continue;
                    }
                    hosts
                        .entry(host.to_string())
                        .or_default()
                        .values
                        .insert(key.to_string(), value.to_string());
                }
                None if rest == "usesshconfig" => {
                    use_ssh_config = git_bool(value).ok_or_else(|| {
                        Error::config(format!(
                            "invalid boolean {SECTION}.usesshconfig: {value:?}"
                        ))
                    })?;
                }
                None => {}
            }
        }

        let mut included = BTreeMap::new();
        for (host, entry) in hosts {
            let enabled = match entry.values.get("enabled") {
                Some(value) => git_bool(value).ok_or_else(|| {
                    Error::config(format!(
                        "invalid boolean {SECTION}.{host}.enabled: {value:?}"
                    ))
                })?,
                None => true,
            };
            if enabled && entry.values.contains_key("path") {
                included.insert(host, entry);
            }
        }

        Ok(DissectConfig {
            hosts: included,
            use_ssh_config,
            ssh_config: SshConfig::new(),
        })
    }

    /// Replaces the SSH-config fallback source (used by tests and `load`).
    pub fn with_ssh_config(mut self, ssh_config: SshConfig) -> Self {
        self.ssh_config = ssh_config;
        self
    }

    pub fn use_ssh_config(&self) -> bool {
        self.use_ssh_config
    }

    /// Configured host names in sorted order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// True when no host passed the inclusion rules.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Remote working directory; mandatory, so present by construction.
    pub fn path(&self, host: &str) -> Result<&str> {
        self.hosts
            .get(host)
            .and_then(|entry| entry.values.get("path"))
            .map(String::as_str)
            .ok_or_else(|| Error::config(format!("host {host} is not configured")))
    }

    pub fn username(&self, host: &str) -> Result<String> {
        match self.resolve(host, "user", Expected::Str)? {
            Some(Value::Str(user)) => Ok(user),
            _ => current_username(),
        }
    }

    pub fn hostname(&self, host: &str) -> Result<String> {
        match self.resolve(host, "hostname", Expected::Str)? {
            Some(Value::Str(name)) => Ok(name),
            _ => Ok(host.to_string()),
        }
    }

    pub fn port(&self, host: &str) -> Result<u16> {
        match self.resolve(host, "port", Expected::Int)? {
            Some(Value::Int(port)) => u16::try_from(port).map_err(|_| {
                Error::config(format!("port for {host} out of range: {port}"))
            }),
            _ => Ok(22),
        }
    }

    pub fn strict_host_key_checking(&self, host: &str) -> Result<bool> {
        match self.resolve(host, "stricthostkeychecking", Expected::Bool)? {
            Some(Value::Bool(strict)) => Ok(strict),
            _ => Ok(true),
        }
    }

    /// Tunnel command template with `%h`/`%p`/`%r` placeholders, or `None`
    /// when unset or set to the `none` sentinel.
    pub fn proxy_command(&self, host: &str) -> Result<Option<String>> {
        match self.resolve(host, "proxycommand", Expected::Str)? {
            Some(Value::Str(cmd)) if cmd.eq_ignore_ascii_case("none") => Ok(None),
            Some(Value::Str(cmd)) => Ok(Some(cmd)),
            _ => Ok(None),
        }
    }

    /// Resolution chain: repo config, then SSH config. Each source coerces to
    /// `expected` with its own rules; first present value wins. `Ok(None)`
    /// means no source had the key and the caller's default applies.
    fn resolve(&self, host: &str, key: &str, expected: Expected) -> Result<Option<Value>> {
        if let Some(raw) = self.hosts.get(host).and_then(|e| e.values.get(key)) {
            return coerce_git(host, key, raw, expected).map(Some);
        }
        if let Some(raw) = self.ssh_config.lookup(host).get(key) {
            return coerce_ssh(host, key, raw, expected).map(Some);
        }
        Ok(None)
    }
}

/// Repo-config coercion follows git's own boolean vocabulary.
fn coerce_git(host: &str, key: &str, raw: &str, expected: Expected) -> Result<Value> {
    match expected {
        Expected::Bool => git_bool(raw).map(Value::Bool).ok_or_else(|| {
            Error::config(format!("invalid boolean {SECTION}.{host}.{key}: {raw:?}"))
        }),
        Expected::Int => raw.parse().map(Value::Int).map_err(|_| {
            Error::config(format!("invalid integer {SECTION}.{host}.{key}: {raw:?}"))
        }),
        Expected::Str => Ok(Value::Str(raw.to_string())),
    }
}

/// SSH-config coercion accepts exactly `yes`/`no` for booleans; anything else
/// a boolean key could hold there (`ask`, `accept-new`) is fatal.
fn coerce_ssh(host: &str, key: &str, raw: &str, expected: Expected) -> Result<Value> {
    match expected {
        Expected::Bool => match raw {
            "yes" => Ok(Value::Bool(true)),
            "no" => Ok(Value::Bool(false)),
            other => Err(Error::config(format!(
                "invalid boolean {host}.{key} in ssh config: {other:?}"
            ))),
        },
        Expected::Int => raw.parse().map(Value::Int).map_err(|_| {
            Error::config(format!(
                "invalid integer {host}.{key} in ssh config: {raw:?}"
            ))
        }),
        Expected::Str => Ok(Value::Str(raw.to_string())),
    }
}

fn git_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn current_username() -> Result<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .map_err(|_| Error::config("cannot determine local username (USER/LOGNAME unset)"))
}

fn git_config_list() -> Result<String> {
    let output = Command::new("git")
        .args(["config", "--list", "--null"])
        .output()
        .map_err(|e| Error::config(format!("failed to run git config: {e}")))?;
    if !output.status.success() {
        return Err(Error::config(format!(
            "git config --list failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|_| Error::config("git config output was not valid UTF-8"))
}
