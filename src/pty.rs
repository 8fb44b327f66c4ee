use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use rustix::pty::{grantpt, openpt, ptsname, unlockpt, OpenptFlags};

use crate::error::{errno_io, Error, Result};
use crate::pump;
use crate::term::{self, RawModeGuard};

pub struct PtyPair {
    pub controller: OwnedFd,
    pub subordinate: OwnedFd,
}

// Note: rustix::pty::ptsname() calls the non-thread-safe macOS ptsname(3).
// Safe here because PTY creation happens before fork(), on the dispatch
// thread; if creation ever moves to a threaded context this needs a Mutex.
pub fn create_pty() -> Result<PtyPair> {
    let controller = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
        .map_err(|e| Error::RelayIo { source: errno_io(e) })?;
    grantpt(&controller).map_err(|e| Error::RelayIo { source: errno_io(e) })?;
    unlockpt(&controller).map_err(|e| Error::RelayIo { source: errno_io(e) })?;

    let name = ptsname(&controller, Vec::new())
        .map_err(|e| Error::RelayIo { source: errno_io(e) })?;
    let subordinate = rustix::fs::open(
        name.as_c_str(),
        rustix::fs::OFlags::RDWR | rustix::fs::OFlags::NOCTTY,
        rustix::fs::Mode::empty(),
    )
    .map_err(|e| Error::RelayIo { source: errno_io(e) })?;

    Ok(PtyPair {
        controller,
        subordinate,
    })
}

/// Run `command` attached to a fresh PTY, handing the invoking terminal over
/// to it until it exits. Returns the child's exit code (128 + signal number
/// for signal deaths).
///
/// When `dry_run` is set the command line is printed and nothing is spawned.
/// When stdin is not a terminal, falls back to a plain blocking spawn with
/// inherited stdio so non-interactive environments keep working.
pub fn run_interactive(command: &[String], dry_run: bool) -> Result<i32> {
    if dry_run {
        println!("dry-run: {}", command.join(" "));
        return Ok(0);
    }

    let program = command.first().ok_or_else(|| {
        Error::spawn_failed(
            command,
            io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        )
    })?;

    // Resolve the executable before touching terminal attributes, so a
    // missing binary can never leave the terminal raw.
    resolve_executable(program).map_err(|source| Error::spawn_failed(command, source))?;

    let real_stdin = rustix::stdio::stdin();
    let real_stdout = rustix::stdio::stdout();

    let _guard = match RawModeGuard::enter(real_stdin) {
        Ok(guard) => guard,
        Err(Error::TerminalUnavailable) => return run_delegated(command),
        Err(e) => return Err(e),
    };

    let pty = create_pty()?;
    // Best effort: without a winsize the child starts at the driver default
    // until the first SIGWINCH.
    let _ = term::copy_winsize(real_stdin, pty.controller.as_fd());

    let (controller, child_pid) = spawn_in_pty(command, pty)?;
    pump::relay_loop(real_stdin, real_stdout, controller.as_fd(), child_pid)
}

/// Fork and exec `command` on the subordinate side of `pty`, in its own
/// session with the subordinate as controlling terminal so the child gets
/// full job control independent of the invoking shell.
pub(crate) fn spawn_in_pty(command: &[String], pty: PtyPair) -> Result<(OwnedFd, libc::pid_t)> {
    match unsafe { libc::fork() } {
        -1 => Err(Error::spawn_failed(command, io::Error::last_os_error())),
        0 => {
            // Child: new session, claim the PTY, exec.
            drop(pty.controller);

            if unsafe { libc::setsid() } == -1 {
                eprintln!("vmsh: setsid failed");
                unsafe { libc::_exit(127) };
            }

            let sub_raw = pty.subordinate.as_raw_fd();
            if unsafe { libc::ioctl(sub_raw, libc::TIOCSCTTY as libc::c_ulong, 0) } == -1 {
                eprintln!("vmsh: TIOCSCTTY failed");
            }

            for fd in 0..=2 {
                if unsafe { libc::dup2(sub_raw, fd) } == -1 {
                    unsafe { libc::_exit(127) };
                }
            }
            drop(pty.subordinate);

            let err = execvp_vec(command);
            eprintln!("vmsh: exec failed: {err}");
            unsafe { libc::_exit(127) };
        }
        child_pid => {
            drop(pty.subordinate);
            Ok((pty.controller, child_pid))
        }
    }
}

/// Degenerate no-PTY path for non-interactive environments: a single
/// blocking spawn with inherited stdio, no raw mode, no relay.
fn run_delegated(command: &[String]) -> Result<i32> {
    tracing::debug!("no controlling terminal, running without a pty");
    let (program, args) = command.split_first().ok_or_else(|| {
        Error::spawn_failed(
            command,
            io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        )
    })?;
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .map_err(|source| Error::spawn_failed(command, source))?;
    Ok(exit_code_of(status))
}

pub(crate) fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Locate `program` the way the shell would: paths containing a separator
/// are checked as-is, bare names are searched on PATH. Returns the error the
/// spawn would have produced (NotFound, PermissionDenied).
fn resolve_executable(program: &str) -> io::Result<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return check_candidate(direct).map(|()| direct.to_path_buf());
    }

    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(program);
        if check_candidate(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{program}: command not found"),
    ))
}

fn check_candidate(path: &Path) -> io::Result<()> {
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}: no such file", path.display()),
        ));
    }
    rustix::fs::access(path, rustix::fs::Access::EXEC_OK).map_err(|_| {
        io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{}: not executable", path.display()),
        )
    })
}

fn execvp_vec(command: &[String]) -> io::Error {
    use std::ffi::CString;

    let Ok(program) = CString::new(command[0].as_str()) else {
        return io::Error::new(io::ErrorKind::InvalidInput, "command path contains null byte");
    };
    let args: Vec<CString> = command
        .iter()
        .filter_map(|a| CString::new(a.as_str()).ok())
        .collect();
    let arg_ptrs: Vec<*const libc::c_char> = args
        .iter()
        .map(|a| a.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect();
    unsafe {
        libc::execvp(program.as_ptr(), arg_ptrs.as_ptr());
    }
    io::Error::last_os_error()
}
