use std::os::fd::{AsRawFd, BorrowedFd};

use rustix::event::{poll, PollFd, PollFlags, Timespec};
use rustix::io::Errno;
use signal_hook::iterator::backend::Handle as SignalHandle;
use signal_hook::iterator::Signals;

use crate::error::{errno_io, Error, Result};

/// Relay chunk bound per direction.
const CHUNK: usize = 10 * 1024;
/// Cap on input queued toward the child while its PTY buffer is full.
const MAX_PENDING: usize = 256 * 1024;

/// Bidirectional byte relay between the real terminal and the controller
/// side of a PTY, until the child exits.
///
/// Readiness-polls both sources with a one second timeout so child liveness
/// is re-checked even when no I/O is flowing. Bytes pass through unmodified
/// and in order; buffered child output is drained before returning. Returns
/// the child's exit code.
pub fn relay_loop(
    real_stdin: BorrowedFd,
    real_stdout: BorrowedFd,
    controller: BorrowedFd,
    child_pid: libc::pid_t,
) -> Result<i32> {
    let signal_thread = spawn_signal_thread(
        child_pid,
        real_stdin.as_raw_fd(),
        controller.as_raw_fd(),
    );

    // The controller side must not block: the child can be wedged writing to
    // the subordinate while we are wedged writing to the controller, a
    // circular wait. Queue what does not fit instead.
    set_nonblocking(controller.as_raw_fd());

    let mut buf = [0u8; CHUNK];
    let mut pending: Vec<u8> = Vec::new();
    let mut stdin_open = true;
    let mut exit_code: Option<i32> = None;

    let outcome = loop {
        let timeout = Timespec {
            tv_sec: 1,
            tv_nsec: 0,
        };

        let controller_flags = if pending.is_empty() {
            PollFlags::IN
        } else {
            PollFlags::IN | PollFlags::OUT
        };
        // Stdin leaves the poll set after EOF (a closed pipe would otherwise
        // report HUP every round) and while the pending queue is saturated.
        let mut fds: Vec<PollFd> = Vec::with_capacity(2);
        let watch_stdin = stdin_open && pending.len() < MAX_PENDING;
        if watch_stdin {
            fds.push(PollFd::new(&real_stdin, PollFlags::IN));
        }
        fds.push(PollFd::new(&controller, controller_flags));

        match poll(&mut fds, Some(&timeout)) {
            Ok(0) => {
                if let Some(code) = try_reap(child_pid) {
                    exit_code = Some(code);
                    break Ok(());
                }
            }
            Ok(_) => match shuttle(
                if watch_stdin { Some(&fds[0]) } else { None },
                &fds[fds.len() - 1],
                &real_stdin,
                &real_stdout,
                &controller,
                &mut buf,
                &mut pending,
                &mut stdin_open,
            ) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            },
            Err(e) if e == Errno::INTR => {}
            Err(e) => break Err(Error::RelayIo { source: errno_io(e) }),
        }
    };

    signal_thread.close_and_join();

    match outcome {
        Ok(()) => {
            drain_remaining(&controller, &real_stdout, &mut buf);
            Ok(exit_code.unwrap_or_else(|| wait_final(child_pid)))
        }
        Err(e) => {
            // Session is unusable: detach the child and reap it so the error
            // can propagate without leaving a zombie behind.
            unsafe { libc::kill(child_pid, libc::SIGHUP) };
            let _ = wait_final(child_pid);
            Err(e)
        }
    }
}

/// One poll round of byte shuttling. Returns true when the session is over
/// (child side closed).
#[allow(clippy::too_many_arguments)]
fn shuttle(
    stdin_poll: Option<&PollFd>,
    controller_poll: &PollFd,
    real_stdin: &BorrowedFd,
    real_stdout: &BorrowedFd,
    controller: &BorrowedFd,
    buf: &mut [u8],
    pending: &mut Vec<u8>,
    stdin_open: &mut bool,
) -> Result<bool> {
    // Flush queued input first so user keystrokes keep their order.
    if controller_poll.revents().contains(PollFlags::OUT) && !pending.is_empty() {
        match rustix::io::write(controller, pending) {
            Ok(n) => {
                pending.drain(0..n);
            }
            Err(e) if e == Errno::INTR || e == Errno::AGAIN => {}
            Err(e) => return Err(Error::RelayIo { source: errno_io(e) }),
        }
    }

    if let Some(stdin_poll) = stdin_poll {
        let revents = stdin_poll.revents();
        if revents.contains(PollFlags::IN) {
            match rustix::io::read(real_stdin, &mut *buf) {
                // Terminal input closed; the session continues until the child
                // exits, there is just nothing more to forward.
                Ok(0) => *stdin_open = false,
                Ok(n) => {
                    if pending.is_empty() {
                        match rustix::io::write(controller, &buf[..n]) {
                            Ok(written) if written < n => {
                                pending.extend_from_slice(&buf[written..n]);
                            }
                            Ok(_) => {}
                            Err(e) if e == Errno::INTR || e == Errno::AGAIN => {
                                pending.extend_from_slice(&buf[..n]);
                            }
                            Err(e) => return Err(Error::RelayIo { source: errno_io(e) }),
                        }
                    } else {
                        pending.extend_from_slice(&buf[..n]);
                    }
                }
                Err(e) if e == Errno::INTR || e == Errno::AGAIN => {}
                Err(e) => return Err(Error::RelayIo { source: errno_io(e) }),
            }
        } else if revents.intersects(PollFlags::HUP | PollFlags::ERR) {
            // Hangup with nothing left to read (e.g. a pipe whose writer is
            // gone, or the terminal disconnecting mid-session). Without IN
            // there is no zero-byte read to signal EOF, so mark stdin closed
            // here or poll would report the hangup every round.
            *stdin_open = false;
        }
    }

    if controller_poll.revents().contains(PollFlags::IN) {
        match rustix::io::read(controller, &mut *buf) {
            Ok(0) => return Ok(true),
            Ok(n) => write_all(real_stdout, &buf[..n])?,
            Err(e) if e == Errno::INTR || e == Errno::AGAIN => {}
            // On Linux the controller read reports EIO once the subordinate
            // side is fully closed; treat it as end of session, not failure.
            Err(e) if e == Errno::IO => return Ok(true),
            Err(e) => return Err(Error::RelayIo { source: errno_io(e) }),
        }
    }

    if controller_poll.revents().contains(PollFlags::HUP) {
        return Ok(true);
    }

    Ok(false)
}

/// Flush whatever the child wrote between the last poll round and its exit.
fn drain_remaining(controller: &BorrowedFd, real_stdout: &BorrowedFd, buf: &mut [u8]) {
    loop {
        let zero = Timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let mut fds = [PollFd::new(controller, PollFlags::IN)];
        match poll(&mut fds, Some(&zero)) {
            Ok(n) if n > 0 && fds[0].revents().intersects(PollFlags::IN | PollFlags::HUP) => {
                match rustix::io::read(controller, &mut *buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if write_all(real_stdout, &buf[..n]).is_err() {
                            break;
                        }
                    }
                }
            }
            _ => break,
        }
    }
}

fn write_all(fd: &BorrowedFd, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match rustix::io::write(fd, data) {
            Ok(n) => data = &data[n..],
            Err(e) if e == Errno::INTR => continue,
            Err(e) => return Err(Error::RelayIo { source: errno_io(e) }),
        }
    }
    Ok(())
}

fn set_nonblocking(fd: libc::c_int) {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags >= 0 {
        unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    }
}

/// Non-blocking liveness check; returns the exit code once the child has
/// been reaped.
fn try_reap(pid: libc::pid_t) -> Option<i32> {
    let mut status: libc::c_int = 0;
    match unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } {
        0 => None,
        p if p == pid => Some(decode_wait_status(status)),
        _ => {
            // EINTR means try again next round; anything else means the
            // child is gone and its status is unrecoverable.
            if std::io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
                None
            } else {
                Some(0)
            }
        }
    }
}

fn wait_final(pid: libc::pid_t) -> i32 {
    let mut status: libc::c_int = 0;
    loop {
        match unsafe { libc::waitpid(pid, &mut status, 0) } {
            p if p == pid => return decode_wait_status(status),
            _ => {
                if std::io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
                    return 0;
                }
            }
        }
    }
}

fn decode_wait_status(status: libc::c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        0
    }
}

struct SignalThread {
    handle: SignalHandle,
    join: std::thread::JoinHandle<()>,
}

impl SignalThread {
    fn close_and_join(self) {
        self.handle.close();
        let _ = self.join.join();
    }
}

/// Forward session-relevant signals to the child for the duration of the
/// bridge. SIGWINCH and SIGCONT additionally propagate the current window
/// size onto the PTY so full-screen programs redraw at the right geometry.
fn spawn_signal_thread(
    child_pid: libc::pid_t,
    stdin_fd: libc::c_int,
    controller_fd: libc::c_int,
) -> SignalThread {
    let mut signals = Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGHUP,
        signal_hook::consts::SIGWINCH,
        signal_hook::consts::SIGCONT,
    ])
    .expect("failed to register signal handlers");

    let handle = signals.handle();

    let join = std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == signal_hook::consts::SIGWINCH || sig == signal_hook::consts::SIGCONT {
                forward_winsize(stdin_fd, controller_fd);
            }
            unsafe { libc::kill(child_pid, sig) };
        }
    });

    SignalThread { handle, join }
}

fn forward_winsize(stdin_fd: libc::c_int, controller_fd: libc::c_int) {
    unsafe {
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(stdin_fd, libc::TIOCGWINSZ, &mut ws) == 0 {
            libc::ioctl(controller_fd, libc::TIOCSWINSZ, &ws);
        }
    }
}
