use std::os::fd::BorrowedFd;

use rustix::termios::{self, OptionalActions, Termios};

use crate::error::{errno_io, Error, Result};

/// Scoped raw-mode switch for a terminal fd.
///
/// Captures the current line-discipline attributes, applies raw mode, and
/// restores the captured attributes on drop. Restoration therefore happens on
/// every exit path out of a bridged session, including early returns and
/// panic unwinds.
pub struct RawModeGuard<'fd> {
    fd: BorrowedFd<'fd>,
    saved: Termios,
}

impl<'fd> RawModeGuard<'fd> {
    /// Switch `fd` into raw mode. Fails with `TerminalUnavailable` when the
    /// fd is not a terminal (e.g. stdin redirected from a pipe), leaving the
    /// fd untouched.
    pub fn enter(fd: BorrowedFd<'fd>) -> Result<Self> {
        let saved = termios::tcgetattr(fd).map_err(|_| Error::TerminalUnavailable)?;
        let mut raw = saved.clone();
        raw.make_raw();
        termios::tcsetattr(fd, OptionalActions::Now, &raw)
            .map_err(|_| Error::TerminalUnavailable)?;
        Ok(Self { fd, saved })
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        // Drain pending output before reapplying the saved attributes, so the
        // tail of the child's output is not clipped.
        let _ = termios::tcsetattr(self.fd, OptionalActions::Drain, &self.saved);
    }
}

/// Copy the window size from one terminal fd to another, so a freshly
/// allocated PTY starts with the user's real geometry.
pub fn copy_winsize(from: BorrowedFd, to: BorrowedFd) -> Result<()> {
    let ws = termios::tcgetwinsize(from).map_err(|e| Error::RelayIo {
        source: errno_io(e),
    })?;
    termios::tcsetwinsize(to, ws).map_err(|e| Error::RelayIo {
        source: errno_io(e),
    })?;
    Ok(())
}
