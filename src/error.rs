use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds for the subprocess bridging core.
///
/// A non-zero child exit is deliberately not represented here: both execution
/// paths return it as a status value for the caller to inspect.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The invoking process has no controlling terminal to place in raw mode.
    /// Fatal to the PTY path only; batch execution never needs a terminal.
    #[error("no controlling terminal available")]
    TerminalUnavailable,

    /// The external program could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A read or write on the terminal or PTY failed mid-session.
    #[error("terminal relay failed: {source}")]
    RelayIo {
        #[from]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn spawn_failed(command: &[String], source: io::Error) -> Self {
        Error::SpawnFailed {
            command: command.join(" "),
            source,
        }
    }
}

/// Translate a raw OS errno into a `std::io::Error`.
pub(crate) fn errno_io(e: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(e.raw_os_error())
}
