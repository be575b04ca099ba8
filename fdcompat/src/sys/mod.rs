//! Native primitives the emulation is written against.
//!
//! Both backends expose the same vocabulary: handle classification, the
//! per-kind readiness probes, a socket peek, a merged blocking wait and a
//! file lock. The Windows backend talks to Win32 and Winsock directly;
//! the Unix backend expresses the same operations with POSIX calls so the
//! emulation layer behaves identically on both.

use bitflags::bitflags;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub use self::windows::*;
    } else if #[cfg(unix)] {
        mod unix;
        pub use self::unix::*;
    }
}

/// What native introspection says a descriptor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleKind {
    Socket,
    Pipe,
    ConsoleInput,
    ConsoleOutput,
    Waitable,
}

/// Result of a non-destructive look into a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipeState {
    /// The peek succeeded; this many bytes are queued.
    Available(usize),
    /// The far end is gone.
    Broken,
    /// The handle cannot be peeked, typically because it is a write end.
    Unpeekable,
}

/// Result of inspecting a console input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleQueue {
    /// No records are queued at all.
    Empty,
    /// At least one queued record is a key press.
    KeyPressed,
    /// Records are queued, but none of them is a key press.
    #[cfg_attr(unix, allow(dead_code))]
    NoKeys,
    /// Records were announced but could not be read back.
    Failed,
}

/// What a zero-wait look at a generic waitable handle found. Hang-up and
/// error conditions are reported whatever interest was registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Signal {
    pub(crate) ready: bool,
    pub(crate) hangup: bool,
    pub(crate) error: bool,
}

/// Result of a `MSG_PEEK` receive on a socket that reported read activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeekOutcome {
    Data,
    NotConnected,
    Eof,
    Hangup,
    Failed,
}

bitflags! {
    /// The Winsock network event vocabulary (`FD_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct NetworkEvents: i32 {
        const READ = 0x01;
        const WRITE = 0x02;
        const OOB = 0x04;
        const ACCEPT = 0x08;
        const CONNECT = 0x10;
        const CLOSE = 0x20;
    }
}
