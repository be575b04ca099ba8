use log::trace;

use super::{wait_for, Pollable};
use crate::poll::PollFlags;
use crate::sys::{self, NativeWait, RawDescriptor};

/// Anything else: files, devices, and handles whose signaled state is the
/// only readiness signal available.
pub(crate) struct Waitable {
    fd: RawDescriptor,
}

impl Waitable {
    pub(crate) fn new(fd: RawDescriptor) -> Waitable {
        Waitable { fd }
    }

    fn check(&self, sought: PollFlags) -> PollFlags {
        let state = sys::signal_state(self.fd, sought);
        let mut revents = PollFlags::empty();
        if state.ready {
            trace!("descriptor {} is signaled", self.fd);
            revents |= sought - PollFlags::PRIORITY;
        }
        if state.hangup {
            revents |= PollFlags::POLLHUP;
        }
        if state.error {
            revents |= PollFlags::POLLERR;
        }
        revents
    }
}

impl Pollable for Waitable {
    fn fd(&self) -> RawDescriptor {
        self.fd
    }

    fn probe(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags {
        let revents = self.check(sought);
        wait_for(wait, self.fd, sought);
        revents
    }

    fn consume_wake(&mut self, sought: PollFlags, _: &mut NativeWait) -> PollFlags {
        self.check(sought)
    }
}
