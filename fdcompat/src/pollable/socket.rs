use log::{trace, warn};

use super::Pollable;
use crate::poll::PollFlags;
use crate::sys::{self, NativeWait, NetworkEvents, PeekOutcome, RawDescriptor};

/// A socket, watched through network event registration instead of a
/// handle wait.
pub(crate) struct Socket {
    fd: RawDescriptor,
    registered: bool,
}

impl Socket {
    pub(crate) fn new(fd: RawDescriptor) -> Socket {
        Socket {
            fd,
            registered: false,
        }
    }
}

/// The network events worth registering for. Closure is always watched.
pub(crate) fn requested_events(sought: PollFlags) -> NetworkEvents {
    let mut requested = NetworkEvents::CLOSE;
    if sought.intersects(PollFlags::READ) {
        requested |= NetworkEvents::READ | NetworkEvents::ACCEPT;
    }
    if sought.intersects(PollFlags::WRITE) {
        requested |= NetworkEvents::WRITE | NetworkEvents::CONNECT;
    }
    if sought.intersects(PollFlags::PRIORITY) {
        requested |= NetworkEvents::OOB;
    }
    requested
}

/// Translates fired network events back into readiness. Inbound activity
/// other than a lone pending connection is resolved with `peek`, which is
/// only called when needed.
pub(crate) fn decode(
    fired: NetworkEvents,
    sought: PollFlags,
    peek: impl FnOnce() -> PeekOutcome,
) -> PollFlags {
    let mut revents = PollFlags::empty();

    let inbound = fired & (NetworkEvents::READ | NetworkEvents::ACCEPT | NetworkEvents::CLOSE);
    if inbound == NetworkEvents::ACCEPT {
        revents |= sought & PollFlags::READ;
    } else if !inbound.is_empty() {
        revents |= match peek() {
            PeekOutcome::Data | PeekOutcome::NotConnected => sought & PollFlags::READ,
            PeekOutcome::Eof | PeekOutcome::Hangup => PollFlags::POLLHUP,
            PeekOutcome::Failed => PollFlags::POLLERR,
        };
    }

    if fired.intersects(NetworkEvents::WRITE | NetworkEvents::CONNECT) {
        revents |= sought & PollFlags::WRITE;
    }
    if fired.contains(NetworkEvents::OOB) {
        revents |= sought & PollFlags::PRIORITY;
    }
    revents
}

impl Pollable for Socket {
    fn fd(&self) -> RawDescriptor {
        self.fd
    }

    fn probe(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags {
        match wait.add_socket(self.fd, requested_events(sought)) {
            Ok(()) => {
                self.registered = true;
                PollFlags::empty()
            }
            Err(e) => {
                warn!("registering socket {} failed: {}", self.fd, e);
                self.registered = false;
                PollFlags::POLLERR
            }
        }
    }

    fn consume_wake(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags {
        if !self.registered {
            return PollFlags::POLLERR;
        }
        let fired = wait.socket_events(self.fd);
        trace!("socket {} fired {:?}", self.fd, fired);
        decode(fired, sought, || sys::peek_socket(self.fd))
    }
}
