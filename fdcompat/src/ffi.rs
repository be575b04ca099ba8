//! C entry points mirroring `poll(2)` and `flock(2)`.
//!
//! Failures return -1 and leave the POSIX errno classification in a
//! per-thread slot read back with [`fdcompat_errno`]. On Windows, the
//! descriptors are CRT file descriptors.

use std::cell::Cell;

use libc::{c_int, c_short, c_ulong};

use crate::error::{Error, Result};
use crate::flock::{flock, FlockArg};
use crate::poll::{poll, PollFd, PollFlags, Timeout};
use crate::Descriptor;

thread_local! {
    static LAST_ERRNO: Cell<c_int> = Cell::new(0);
}

/// Layout-compatible with `struct pollfd`.
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct pollfd {
    pub fd: c_int,
    pub events: c_short,
    pub revents: c_short,
}

fn report<T: Into<c_int>>(res: Result<T>) -> c_int {
    match res {
        Ok(v) => v.into(),
        Err(e) => {
            LAST_ERRNO.with(|errno| errno.set(e.errno()));
            -1
        }
    }
}

fn poll_table(fds: &mut [pollfd], timeout: c_int) -> Result<c_int> {
    let timeout = Timeout::from_millis(timeout)?;
    let mut entries: Vec<PollFd> = fds
        .iter()
        .map(|p| PollFd::new(Descriptor::from_c(p.fd), PollFlags::from_bits_truncate(p.events)))
        .collect();

    let count = poll(&mut entries, timeout)?;
    for (p, entry) in fds.iter_mut().zip(&entries) {
        p.revents = entry.revents().bits();
    }
    Ok(count as c_int)
}

/// # Safety
///
/// `fds` must point to `nfds` valid `pollfd` records, or may be null when
/// `nfds` is zero.
#[no_mangle]
pub unsafe extern "C" fn fdcompat_poll(fds: *mut pollfd, nfds: c_ulong, timeout: c_int) -> c_int {
    if nfds > c_int::MAX as c_ulong {
        return report::<c_int>(Err(Error::InvalidArgument("too many entries".to_string())));
    }
    if fds.is_null() {
        if nfds != 0 {
            return report::<c_int>(Err(Error::InvalidArgument("null table".to_string())));
        }
        return report(poll_table(&mut [], timeout));
    }
    let table = std::slice::from_raw_parts_mut(fds, nfds as usize);
    report(poll_table(table, timeout))
}

#[no_mangle]
pub extern "C" fn fdcompat_flock(fd: c_int, op: c_int) -> c_int {
    let res = FlockArg::from_bits(op).and_then(|arg| flock(Descriptor::from_c(fd), arg));
    report(res.map(|()| 0))
}

/// The errno left by the last failing call on this thread.
#[no_mangle]
pub extern "C" fn fdcompat_errno() -> c_int {
    LAST_ERRNO.with(|errno| errno.get())
}
