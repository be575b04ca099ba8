use bitflags::bitflags;

use crate::Descriptor;

bitflags! {
    /// Readiness bits, numbered as in `<poll.h>`.
    ///
    /// `POLLERR` and `POLLHUP` are monitored implicitly and can be reported
    /// even when they were not requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PollFlags: i16 {
        /// Data other than high-priority data may be read without blocking.
        const POLLIN = 0x001;
        /// Out-of-band data is pending.
        const POLLPRI = 0x002;
        /// Data may be written without blocking.
        const POLLOUT = 0x004;
        /// An error condition exists. Output only.
        const POLLERR = 0x008;
        /// The descriptor was hung up. Output only.
        const POLLHUP = 0x010;
        /// Invalid request. Accepted for layout compatibility; the
        /// emulation reports unresolvable descriptors through `POLLERR`.
        const POLLNVAL = 0x020;
        /// Normal data may be read without blocking.
        const POLLRDNORM = 0x040;
        /// Priority band data may be read without blocking.
        const POLLRDBAND = 0x080;
        /// Normal data may be written without blocking.
        const POLLWRNORM = 0x100;
        /// Priority band data may be written.
        const POLLWRBAND = 0x200;
    }
}

impl PollFlags {
    pub(crate) const READ: PollFlags = PollFlags::POLLIN.union(PollFlags::POLLRDNORM);
    pub(crate) const WRITE: PollFlags = PollFlags::POLLOUT
        .union(PollFlags::POLLWRNORM)
        .union(PollFlags::POLLWRBAND);
    pub(crate) const PRIORITY: PollFlags = PollFlags::POLLPRI.union(PollFlags::POLLRDBAND);
}

/// One descriptor and the events the caller is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFd {
    fd: Descriptor,
    events: PollFlags,
    revents: PollFlags,
}

impl PollFd {
    pub fn new(fd: Descriptor, events: PollFlags) -> PollFd {
        PollFd {
            fd,
            events,
            revents: PollFlags::empty(),
        }
    }

    /// An entry that is skipped by every call, the equivalent of a negative
    /// descriptor in a C `pollfd` array.
    pub fn ignored() -> PollFd {
        PollFd::new(Descriptor::IGNORED, PollFlags::empty())
    }

    pub fn fd(&self) -> Descriptor {
        self.fd
    }

    pub fn events(&self) -> PollFlags {
        self.events
    }

    pub fn set_events(&mut self, events: PollFlags) {
        self.events = events;
    }

    /// Events observed by the last call. Overwritten, never accumulated.
    pub fn revents(&self) -> PollFlags {
        self.revents
    }

    pub(crate) fn set_revents(&mut self, revents: PollFlags) {
        self.revents = revents;
    }

    pub fn any(&self) -> bool {
        !self.revents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_bit_values() {
        assert_eq!(PollFlags::POLLIN.bits(), 0x1);
        assert_eq!(PollFlags::POLLOUT.bits(), 0x4);
        assert_eq!(PollFlags::POLLHUP.bits(), 0x10);
        assert_eq!(PollFlags::POLLWRBAND.bits(), 0x200);
    }

    #[test]
    fn groups() {
        assert!(PollFlags::READ.contains(PollFlags::POLLRDNORM));
        assert!(PollFlags::WRITE.contains(PollFlags::POLLWRBAND));
        assert!(!PollFlags::WRITE.intersects(PollFlags::READ | PollFlags::PRIORITY));
    }

    #[test]
    fn fresh_entry_has_no_revents() {
        let fd = PollFd::new(Descriptor::from_raw(3), PollFlags::POLLIN);
        assert!(!fd.any());
        assert!(PollFd::ignored().fd().is_ignored());
    }
}
