//! Shared error types used across all git-dissect modules.
//!
//! Every module returns [`Result<T>`] which uses [`Error`] as the error type.
//! Configuration and connection errors abort a round before any bisect state
//! is mutated; [`Error::Done`] is not a failure at all but the terminal
//! condition of the search, caught at the outermost driver.

pub type Result<T> = std::result::Result<T, Error>;

/// All errors that git-dissect can produce.
///
/// Variants carry enough context to produce helpful user-facing messages:
/// host names, the command that failed, and the remote diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("ssh connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("failed to run command on {host}: {message}")]
    RemoteExec { host: String, message: String },

    #[error("git {command} failed: {message}")]
    Oracle { command: String, message: String },

    #[error("signal socket {path}: {message}")]
    Signal { path: String, message: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// No candidate commits remain; the current bad tip is the answer.
    #[error("bisect complete")]
    Done,
}

impl Error {
    /// Convenience constructor for configuration failures.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
