use log::trace;

use super::{wait_for, Pollable};
use crate::poll::PollFlags;
use crate::sys::{self, NativeWait, PipeState, RawDescriptor};

/// An anonymous or named pipe end.
pub(crate) struct Pipe {
    fd: RawDescriptor,
}

impl Pipe {
    pub(crate) fn new(fd: RawDescriptor) -> Pipe {
        Pipe { fd }
    }

    fn check(&self, sought: PollFlags) -> PollFlags {
        let state = sys::peek_pipe(self.fd);
        trace!("pipe {}: {:?}", self.fd, state);
        resolve(state, sought)
    }
}

/// Turns a peek result into readiness. Write space cannot be measured, so
/// any end whose far side is still there is assumed writable.
fn resolve(state: PipeState, sought: PollFlags) -> PollFlags {
    match state {
        PipeState::Available(0) => sought & PollFlags::WRITE,
        PipeState::Available(_) => sought & (PollFlags::READ | PollFlags::WRITE),
        PipeState::Broken => PollFlags::POLLHUP,
        PipeState::Unpeekable => sought & PollFlags::WRITE,
    }
}

impl Pollable for Pipe {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_bytes_are_readable() {
        assert_eq!(resolve(PipeState::Available(3), PollFlags::POLLIN), PollFlags::POLLIN);
        assert_eq!(
            resolve(PipeState::Available(3), PollFlags::POLLIN | PollFlags::POLLOUT),
            PollFlags::POLLIN | PollFlags::POLLOUT
        );
        assert_eq!(resolve(PipeState::Available(3), PollFlags::POLLPRI), PollFlags::empty());
        assert_eq!(resolve(PipeState::Available(0), PollFlags::POLLIN), PollFlags::empty());
    }

    #[test]
    fn empty_pipe_is_optimistically_writable() {
        let sought = PollFlags::POLLIN | PollFlags::POLLOUT;
        assert_eq!(resolve(PipeState::Available(0), sought), PollFlags::POLLOUT);
        assert_eq!(
            resolve(PipeState::Available(0), PollFlags::POLLWRNORM),
            PollFlags::POLLWRNORM
        );
    }

    #[test]
    fn broken_pipe_hangs_up_regardless_of_interest() {
        assert_eq!(
            resolve(PipeState::Broken, PollFlags::POLLOUT),
            PollFlags::POLLHUP
        );
        assert_eq!(
            resolve(PipeState::Broken, PollFlags::empty()),
            PollFlags::POLLHUP
        );
    }

    #[test]
    fn write_end_is_optimistically_writable() {
        assert_eq!(
            resolve(PipeState::Unpeekable, PollFlags::POLLOUT | PollFlags::POLLIN),
            PollFlags::POLLOUT
        );
        assert_eq!(
            resolve(PipeState::Unpeekable, PollFlags::POLLIN),
            PollFlags::empty()
        );
    }
}
