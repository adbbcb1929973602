//! Out-of-band verdict rendezvous over a Unix datagram socket.
//!
//! A worker running `git dissect signal wait` binds a datagram socket at
//! `<git-dir>/DISSECT_SIGNAL` and blocks. An operator who has inspected the
//! checked-out tree reports the verdict from a second shell with
//! `git dissect signal good` or `... bad`; the waiting process exits with
//! the received byte (0 = good, 1 = bad), which the controller reads back
//! as the test command's exit status.

use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::oracle::Verdict;

pub const SOCKET_NAME: &str = "DISSECT_SIGNAL";

pub fn socket_path(git_dir: &Path) -> PathBuf {
    git_dir.join(SOCKET_NAME)
}

/// Unlinks the socket path when the waiter is done, error paths included.
struct SocketGuard(PathBuf);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Binds the rendezvous socket and blocks until one verdict byte arrives.
pub fn wait(path: &Path) -> Result<u8> {
    let socket = UnixDatagram::bind(path).map_err(|e| Error::Signal {
        path: path.display().to_string(),
        message: if e.kind() == ErrorKind::AddrInUse {
            "already bound; a previous wait may have crashed, remove the socket and retry"
                .to_string()
        } else {
            e.to_string()
        },
    })?;
    let _guard = SocketGuard(path.to_path_buf());

    let mut buf = [0u8; 1];
    let received = socket.recv(&mut buf).map_err(|e| Error::Signal {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if received == 0 {
        return Err(Error::Signal {
            path: path.display().to_string(),
            message: "empty datagram".to_string(),
        });
    }
    Ok(buf[0])
}

/// Sends one verdict byte to a waiting `signal wait`.
pub fn send(path: &Path, verdict: Verdict) -> Result<()> {
    let socket = UnixDatagram::unbound().map_err(Error::Io)?;
    socket
        .send_to(&[verdict.byte()], path)
        .map_err(|e| Error::Signal {
            path: path.display().to_string(),
            message: format!("cannot send verdict (is `git dissect signal wait` running?): {e}"),
        })?;
    Ok(())
}
