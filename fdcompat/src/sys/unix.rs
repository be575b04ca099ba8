//! POSIX rendition of the native vocabulary.
//!
//! `FIONREAD` plus a zero-timeout `poll(2)` stands in for `PeekNamedPipe`,
//! `poll(2)` over every registered descriptor is the merged blocking wait,
//! and `flock(2)` gives whole-file locks owned by the open file.

use std::{io, mem, os::unix::io::RawFd, thread, time::Duration};

use nix::{
    errno::Errno,
    fcntl::{self, fcntl, FcntlArg},
    sys::{
        socket::{recv, MsgFlags},
        stat::fstat,
    },
    unistd::isatty,
};

use super::{ConsoleQueue, HandleKind, NetworkEvents, PeekOutcome, PipeState, Signal};
use crate::error::{Error, Result};
use crate::poll::PollFlags;

pub type RawDescriptor = RawFd;

/// `poll(2)` imposes no wait-object limit beyond the descriptor table.
pub(crate) const MAX_WAIT_OBJECTS: usize = i32::MAX as usize;

mod ioctl {
    use nix::ioctl_read_bad;

    ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);
}

fn access_mode(fd: RawFd) -> nix::Result<libc::c_int> {
    Ok(fcntl(fd, FcntlArg::F_GETFL)? & libc::O_ACCMODE)
}

fn poll_now(fd: RawFd, events: libc::c_short) -> nix::Result<libc::c_short> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    Errno::result(unsafe { libc::poll(&mut pfd, 1, 0) })?;
    Ok(pfd.revents)
}

fn poll_events(sought: PollFlags) -> libc::c_short {
    let mut events = 0;
    if sought.intersects(PollFlags::READ) {
        events |= libc::POLLIN;
    }
    if sought.intersects(PollFlags::WRITE) {
        events |= libc::POLLOUT;
    }
    if sought.intersects(PollFlags::PRIORITY) {
        events |= libc::POLLPRI;
    }
    events
}

fn is_listening(fd: RawFd) -> bool {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    let res = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ACCEPTCONN,
            &mut value as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };
    res == 0 && value != 0
}

fn millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            // Round up so a short remainder does not turn into a busy spin.
            let ms = d.as_micros().div_ceil(1000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

pub(crate) fn from_c_descriptor(fd: libc::c_int) -> RawDescriptor {
    fd
}

pub(crate) fn posix_errno(error: &io::Error) -> Option<i32> {
    error.raw_os_error()
}

/// A terminal is console input when opened read-only and a screen buffer
/// when opened write-only. A read-write terminal has no single direction and
/// is left to the generic waitability check.
pub(crate) fn classify(fd: RawFd) -> io::Result<HandleKind> {
    let stat = fstat(fd)?;
    let kind = match stat.st_mode & libc::S_IFMT {
        libc::S_IFSOCK => HandleKind::Socket,
        libc::S_IFIFO => HandleKind::Pipe,
        libc::S_IFCHR if isatty(fd).unwrap_or(false) => match access_mode(fd)? {
            libc::O_RDONLY => HandleKind::ConsoleInput,
            libc::O_WRONLY => HandleKind::ConsoleOutput,
            _ => HandleKind::Waitable,
        },
        _ => HandleKind::Waitable,
    };
    Ok(kind)
}

pub(crate) fn peek_pipe(fd: RawFd) -> PipeState {
    let closed = match poll_now(fd, 0) {
        Ok(revents) => revents & (libc::POLLHUP | libc::POLLERR) != 0,
        Err(_) => return PipeState::Unpeekable,
    };

    // A write end has nothing to peek at.
    if access_mode(fd).map_or(true, |mode| mode == libc::O_WRONLY) {
        return if closed {
            PipeState::Broken
        } else {
            PipeState::Unpeekable
        };
    }

    let mut avail: libc::c_int = 0;
    match unsafe { ioctl::fionread(fd, &mut avail) } {
        Ok(_) if avail > 0 => PipeState::Available(avail as usize),
        Ok(_) | Err(_) if closed => PipeState::Broken,
        Ok(_) => PipeState::Available(0),
        Err(_) => PipeState::Unpeekable,
    }
}

/// Terminals only queue typed input, so any pending byte is a key press.
pub(crate) fn console_input(fd: RawFd) -> ConsoleQueue {
    let mut pending: libc::c_int = 0;
    match unsafe { ioctl::fionread(fd, &mut pending) } {
        Ok(_) if pending > 0 => ConsoleQueue::KeyPressed,
        Ok(_) => ConsoleQueue::Empty,
        Err(_) => ConsoleQueue::Failed,
    }
}

fn signal(revents: libc::c_short) -> Signal {
    Signal {
        ready: revents & (libc::POLLIN | libc::POLLOUT | libc::POLLPRI) != 0,
        hangup: revents & libc::POLLHUP != 0,
        error: revents & libc::POLLERR != 0,
    }
}

pub(crate) fn signal_state(fd: RawFd, sought: PollFlags) -> Signal {
    poll_now(fd, poll_events(sought)).map_or(Signal::default(), signal)
}

pub(crate) fn peek_socket(fd: RawFd) -> PeekOutcome {
    let mut data = [0u8; 64];
    match recv(fd, &mut data, MsgFlags::MSG_PEEK | MsgFlags::MSG_DONTWAIT) {
        Ok(0) => PeekOutcome::Eof,
        Ok(_) => PeekOutcome::Data,
        Err(Errno::ENOTCONN) => PeekOutcome::NotConnected,
        Err(Errno::ESHUTDOWN | Errno::ECONNRESET | Errno::ECONNABORTED | Errno::ENETRESET) => {
            PeekOutcome::Hangup
        }
        Err(_) => PeekOutcome::Failed,
    }
}

pub(crate) fn sleep(quantum: Duration) {
    thread::sleep(quantum)
}

struct SocketSlot {
    fd: RawFd,
    index: usize,
    listening: bool,
}

/// Every registered descriptor goes into one `poll(2)` set. Socket interest
/// is expressed in the Winsock vocabulary and translated on the way in and
/// out, so the caller sees the same events on every platform.
pub(crate) struct NativeWait {
    fds: Vec<libc::pollfd>,
    sockets: Vec<SocketSlot>,
    handles: usize,
}

impl NativeWait {
    pub(crate) fn new() -> io::Result<NativeWait> {
        Ok(NativeWait {
            fds: Vec::new(),
            sockets: Vec::new(),
            handles: 0,
        })
    }

    pub(crate) fn add_socket(&mut self, fd: RawFd, requested: NetworkEvents) -> io::Result<()> {
        let mut events = 0;
        if requested.intersects(NetworkEvents::READ | NetworkEvents::ACCEPT) {
            events |= libc::POLLIN;
        }
        if requested.intersects(NetworkEvents::WRITE | NetworkEvents::CONNECT) {
            events |= libc::POLLOUT;
        }
        if requested.contains(NetworkEvents::OOB) {
            events |= libc::POLLPRI;
        }
        // CLOSE needs no bit, poll(2) always reports POLLHUP and POLLERR.
        self.sockets.push(SocketSlot {
            fd,
            index: self.fds.len(),
            listening: is_listening(fd),
        });
        self.fds.push(libc::pollfd {
            fd,
            events,
            revents: 0,
        });
        Ok(())
    }

    pub(crate) fn add_handle(&mut self, fd: RawFd, sought: PollFlags) {
        self.fds.push(libc::pollfd {
            fd,
            events: poll_events(sought),
            revents: 0,
        });
        self.handles += 1;
    }

    pub(crate) fn handle_count(&self) -> usize {
        self.handles
    }

    /// Checks the registered sockets without blocking, recording whatever
    /// has fired. Returns true when any socket has something to report.
    pub(crate) fn poll_sockets(&mut self) -> io::Result<bool> {
        if self.sockets.is_empty() {
            return Ok(false);
        }
        let mut probe: Vec<libc::pollfd> = self
            .sockets
            .iter()
            .map(|slot| libc::pollfd {
                revents: 0,
                ..self.fds[slot.index]
            })
            .collect();
        Errno::result(unsafe { libc::poll(probe.as_mut_ptr(), probe.len() as libc::nfds_t, 0) })?;

        let mut pending = false;
        for (slot, pfd) in self.sockets.iter().zip(&probe) {
            self.fds[slot.index].revents |= pfd.revents;
            pending |= pfd.revents != 0;
        }
        Ok(pending)
    }

    /// Records socket activity seen after the wait.
    pub(crate) fn refresh_sockets(&mut self) -> io::Result<()> {
        self.poll_sockets().map(|_| ())
    }

    /// Blocks until a registered descriptor fires or the timeout elapses.
    /// There is no message queue to drain on this platform, and a signal
    /// interruption counts as a wake-up.
    pub(crate) fn wait(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let mut round: Vec<libc::pollfd> = self
            .fds
            .iter()
            .map(|pfd| libc::pollfd { revents: 0, ..*pfd })
            .collect();
        let res = Errno::result(unsafe {
            libc::poll(
                round.as_mut_ptr(),
                round.len() as libc::nfds_t,
                millis(timeout),
            )
        });
        match res {
            Ok(_) | Err(Errno::EINTR) => (),
            Err(e) => return Err(e.into()),
        }
        for (acc, pfd) in self.fds.iter_mut().zip(&round) {
            acc.revents |= pfd.revents;
        }
        Ok(())
    }

    /// The network events recorded for a socket since registration.
    pub(crate) fn socket_events(&mut self, fd: RawFd) -> NetworkEvents {
        let slot = match self.sockets.iter().find(|slot| slot.fd == fd) {
            Some(slot) => slot,
            None => return NetworkEvents::empty(),
        };
        let revents = self.fds[slot.index].revents;

        let mut fired = NetworkEvents::empty();
        if revents & libc::POLLIN != 0 {
            fired |= if slot.listening {
                NetworkEvents::ACCEPT
            } else {
                NetworkEvents::READ
            };
        }
        if revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            fired |= NetworkEvents::CLOSE;
        }
        if revents & libc::POLLOUT != 0 {
            fired |= NetworkEvents::WRITE;
        }
        if revents & libc::POLLPRI != 0 {
            fired |= NetworkEvents::OOB;
        }
        fired
    }
}

pub(crate) fn file_size(fd: RawFd) -> Result<u64> {
    Ok(fstat(fd)?.st_size as u64)
}

// flock(2) always covers the whole file, so the extent goes unused here.
pub(crate) fn lock_range(fd: RawFd, _len: u64, exclusive: bool, nonblocking: bool) -> Result<()> {
    let arg = match (exclusive, nonblocking) {
        (false, false) => fcntl::FlockArg::LockShared,
        (false, true) => fcntl::FlockArg::LockSharedNonblock,
        (true, false) => fcntl::FlockArg::LockExclusive,
        (true, true) => fcntl::FlockArg::LockExclusiveNonblock,
    };
    match fcntl::flock(fd, arg) {
        Ok(()) => Ok(()),
        Err(Errno::EWOULDBLOCK) if nonblocking => Err(Error::WouldBlock),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn unlock_range(fd: RawFd, _len: u64) -> Result<()> {
    fcntl::flock(fd, fcntl::FlockArg::Unlock)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_rounding() {
        assert_eq!(millis(None), -1);
        assert_eq!(millis(Some(Duration::ZERO)), 0);
        assert_eq!(millis(Some(Duration::from_micros(1))), 1);
        assert_eq!(millis(Some(Duration::from_millis(1500))), 1500);
        assert_eq!(millis(Some(Duration::from_secs(u64::MAX))), libc::c_int::MAX);
    }

    #[test]
    fn poll_event_translation() {
        assert_eq!(poll_events(PollFlags::POLLRDNORM), libc::POLLIN);
        assert_eq!(poll_events(PollFlags::POLLWRBAND), libc::POLLOUT);
        assert_eq!(poll_events(PollFlags::POLLRDBAND), libc::POLLPRI);
        assert_eq!(poll_events(PollFlags::POLLERR | PollFlags::POLLHUP), 0);
    }

    #[test]
    fn hangup_and_error_survive_translation() {
        let hung = signal(libc::POLLIN | libc::POLLERR | libc::POLLHUP);
        assert!(hung.ready && hung.hangup && hung.error);

        let bare = signal(libc::POLLHUP);
        assert!(!bare.ready);
        assert!(bare.hangup);
        assert!(!bare.error);

        assert_eq!(signal(0), Signal::default());
    }

    #[test]
    fn closed_descriptor_does_not_classify() {
        assert!(classify(-1).is_err());
    }
}
