use std::io;

use log::trace;

use crate::poll::PollFlags;
use crate::sys::{self, HandleKind, NativeWait, RawDescriptor};
use crate::Descriptor;

mod console;
mod pipe;
mod socket;
mod waitable;

pub(crate) use console::{ConsoleInput, ConsoleOutput};
pub(crate) use pipe::Pipe;
pub(crate) use socket::Socket;
pub(crate) use waitable::Waitable;

/// Readiness probing for one kind of native handle.
pub(crate) trait Pollable {
    fn fd(&self) -> RawDescriptor;

    /// Checks the handle without blocking before the wait, and registers it
    /// with `wait` if the caller's interest is still outstanding.
    fn probe(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags;

    /// Reports what the handle has to say once the wait returned.
    fn consume_wake(&mut self, sought: PollFlags, wait: &mut NativeWait) -> PollFlags;
}

/// Picks the probe matching what the platform says the descriptor is.
pub(crate) fn classify(fd: Descriptor) -> io::Result<Box<dyn Pollable>> {
    let raw = fd.raw();
    let kind = sys::classify(raw)?;
    trace!("descriptor {} is {:?}", raw, kind);

    Ok(match kind {
        HandleKind::Socket => Box::new(Socket::new(raw)),
        HandleKind::Pipe => Box::new(Pipe::new(raw)),
        HandleKind::ConsoleInput => Box::new(ConsoleInput::new(raw)),
        HandleKind::ConsoleOutput => Box::new(ConsoleOutput::new(raw)),
        HandleKind::Waitable => Box::new(Waitable::new(raw)),
    })
}

/// Keeps a non-socket handle in the blocking wait while some interest
/// remains for it.
fn wait_for(wait: &mut NativeWait, fd: RawDescriptor, residual: PollFlags) {
    if !residual.is_empty() {
        wait.add_handle(fd, residual);
    }
}
