//! Minimal OpenSSH client-config parser used for fallback host settings.
//!
//! Only the subset needed for host lookup is implemented: `Host` blocks with
//! `*`/`?` glob patterns and `!` negation, `key value` / `key=value` lines,
//! and the first-obtained-value-wins rule. `Match` blocks are skipped.
//!
//! Files are parsed in the order `/etc/ssh/ssh_config`, `~/.ssh/config`;
//! within and across files the first value seen for a key wins.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single `Host` pattern, possibly negated.
#[derive(Debug, Clone)]
struct Pattern {
    negated: bool,
    glob: String,
}

impl Pattern {
    fn parse(token: &str) -> Self {
        match token.strip_prefix('!') {
            Some(rest) => Pattern {
                negated: true,
                glob: rest.to_string(),
            },
            None => Pattern {
                negated: false,
                glob: token.to_string(),
            },
        }
    }
}

/// One `Host` block: the patterns it applies to and its options in file order.
#[derive(Debug, Clone)]
struct Block {
    patterns: Vec<Pattern>,
    options: Vec<(String, String)>,
}

/// Parsed SSH client configuration, possibly accumulated from several files.
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<Block>,
}

impl SshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the standard config files. Missing files are silently skipped.
    pub fn load_system() -> Self {
        let mut config = Self::new();
        let mut paths = vec![PathBuf::from("/etc/ssh/ssh_config")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".ssh/config"));
        }
        for path in paths {
            if let Ok(text) = std::fs::read_to_string(&path) {
                tracing::debug!("parsing ssh config {}", path.display());
                config.parse(&text);
            }
        }
        config
    }

    /// Appends the blocks found in `text` to this configuration.
    ///
    /// Options appearing before the first `Host` line apply to every host.
    pub fn parse(&mut self, text: &str) {
        let mut current = Block {
            patterns: vec![Pattern {
                negated: false,
                glob: "*".to_string(),
            }],
            options: Vec::new(),
        };
        // `Match` blocks are not evaluated; their options must not leak.
        let mut skipping = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match split_keyword(line) {
                Some(kv) => kv,
                None => continue,
            };
            match key.as_str() {
                "host" => {
                    self.blocks.push(std::mem::replace(
                        &mut current,
                        Block {
                            patterns: value.split_whitespace().map(Pattern::parse).collect(),
                            options: Vec::new(),
                        },
                    ));
                    skipping = false;
                }
                "match" => {
                    self.blocks.push(std::mem::replace(
                        &mut current,
                        Block {
                            patterns: Vec::new(),
                            options: Vec::new(),
                        },
                    ));
                    skipping = true;
                }
                _ if skipping => {}
                _ => current.options.push((key, value)),
            }
        }
        self.blocks.push(current);
    }

    /// Returns the effective options for `host`, lowercased keys, first
    /// obtained value winning.
    pub fn lookup(&self, host: &str) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        for block in &self.blocks {
            if !block_matches(block, host) {
                continue;
            }
            for (key, value) in &block.options {
                result
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        result
    }
}

fn block_matches(block: &Block, host: &str) -> bool {
    let mut matched = false;
    for pattern in &block.patterns {
        if glob_match(&pattern.glob, host) {
            if pattern.negated {
                return false;
            }
            matched = true;
        }
    }
    matched
}

/// Splits `key value` or `key=value`, lowercasing the key and stripping
/// surrounding double quotes from the value.
fn split_keyword(line: &str) -> Option<(String, String)> {
    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let key = line[..split_at].to_ascii_lowercase();
    let mut value = line[split_at..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = &value[1..value.len() - 1];
    }
    if value.is_empty() {
        return None;
    }
    Some((key, value.to_string()))
}

/// `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some((b'*', rest)) => (0..=t.len()).any(|i| inner(rest, &t[i..])),
            Some((b'?', rest)) => !t.is_empty() && inner(rest, &t[1..]),
            Some((&c, rest)) => t.first() == Some(&c) && inner(rest, &t[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}
