use log::trace;

use super::{wait_for, Pollable};
use crate::poll::PollFlags;
use crate::sys::{self, ConsoleQueue, NativeWait, RawDescriptor};

/// A console input buffer. Only read interest means anything here.
pub(crate) struct ConsoleInput {
    fd: RawDescriptor,
}

impl ConsoleInput {
    pub(crate) fn new(fd: RawDescriptor) -> ConsoleInput {
        ConsoleInput { fd }
    }

    fn check(&self, sought: PollFlags) -> PollFlags {
        let queue = sys::console_input(self.fd);
        trace!("console input {}: {:?}", self.fd, queue);
        resolve(queue, sought & PollFlags::READ)
    }
}

fn resolve(queue: ConsoleQueue, sought: PollFlags) -> PollFlags {
    match queue {
        ConsoleQueue::Empty => PollFlags::empty(),
        _ if sought.is_empty() => PollFlags::empty(),
        ConsoleQueue::Failed => PollFlags::POLLHUP,
        ConsoleQueue::KeyPressed => sought,
        ConsoleQueue::NoKeys => PollFlags::empty(),
    }
}

impl Pollable for ConsoleInput {
    fn fd(&self) -> RawDescriptor {
        self.fd
    }

    fn probe(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags {
        let revents = self.check(sought);
        wait_for(wait, self.fd, sought & PollFlags::READ);
        revents
    }

    fn consume_wake(&mut self, sought: PollFlags, _: &mut NativeWait) -> PollFlags {
        self.check(sought)
    }
}

/// A console screen buffer, always writable.
pub(crate) struct ConsoleOutput {
    fd: RawDescriptor,
}

impl ConsoleOutput {
    pub(crate) fn new(fd: RawDescriptor) -> ConsoleOutput {
        ConsoleOutput { fd }
    }
}

impl Pollable for ConsoleOutput {
    fn fd(&self) -> RawDescriptor {
        self.fd
    }

    fn probe(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags {
        let revents = sought & PollFlags::WRITE;
        wait_for(wait, self.fd, revents);
        revents
    }

    fn consume_wake(&mut self, sought: PollFlags, _: &mut NativeWait) -> PollFlags {
        sought & PollFlags::WRITE
    }
}
