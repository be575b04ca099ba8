//! Whole-file advisory locking.
//!
//! On Unix this is `flock(2)`, owned by the open file. On Windows it is a
//! byte-range lock whose extent is the file's size at the time of the call,
//! queried again on every call, release included. A file that grows after
//! locking is only covered up to its old size there, and releasing it then
//! fails with `Error::Native(ENOLCK)`.

use log::debug;

use crate::error::{Error, Result};
use crate::sys;
use crate::Descriptor;

pub const LOCK_SH: libc::c_int = 1;
pub const LOCK_EX: libc::c_int = 2;
pub const LOCK_NB: libc::c_int = 4;
pub const LOCK_UN: libc::c_int = 8;

/// The lock operation to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlockArg {
    LockShared,
    LockExclusive,
    Unlock,
    LockSharedNonblock,
    LockExclusiveNonblock,
    UnlockNonblock,
}

impl FlockArg {
    /// Parses a `LOCK_*` bitmask. Exactly one of `LOCK_SH`, `LOCK_EX` and
    /// `LOCK_UN` must be present, optionally with `LOCK_NB`.
    pub fn from_bits(op: libc::c_int) -> Result<FlockArg> {
        let arg = match op {
            LOCK_SH => FlockArg::LockShared,
            LOCK_EX => FlockArg::LockExclusive,
            LOCK_UN => FlockArg::Unlock,
            x if x == LOCK_SH | LOCK_NB => FlockArg::LockSharedNonblock,
            x if x == LOCK_EX | LOCK_NB => FlockArg::LockExclusiveNonblock,
            x if x == LOCK_UN | LOCK_NB => FlockArg::UnlockNonblock,
            op => {
                return Err(Error::InvalidArgument(format!(
                    "unknown lock operation: {:#x}",
                    op
                )))
            }
        };
        Ok(arg)
    }

    pub fn is_nonblocking(self) -> bool {
        matches!(
            self,
            FlockArg::LockSharedNonblock
                | FlockArg::LockExclusiveNonblock
                | FlockArg::UnlockNonblock
        )
    }
}

/// Applies `arg` to the whole file behind `fd`.
///
/// A conflicting non-blocking request fails with [`Error::WouldBlock`].
/// Releasing a lock that is not held succeeds on Unix and fails with
/// `Error::Native(ENOLCK)` on Windows.
pub fn flock(fd: Descriptor, arg: FlockArg) -> Result<()> {
    if fd.is_ignored() {
        return Err(Error::BadDescriptor);
    }
    let raw = fd.raw();
    let len = sys::file_size(raw)?;
    let nonblocking = arg.is_nonblocking();

    match arg {
        FlockArg::LockShared | FlockArg::LockSharedNonblock => {
            debug!("shared lock on {} over {} bytes", raw, len);
            sys::lock_range(raw, len, false, nonblocking)
        }
        FlockArg::LockExclusive | FlockArg::LockExclusiveNonblock => {
            debug!("exclusive lock on {} over {} bytes", raw, len);
            sys::lock_range(raw, len, true, nonblocking)
        }
        FlockArg::Unlock | FlockArg::UnlockNonblock => {
            debug!("unlocking {} over {} bytes", raw, len);
            sys::unlock_range(raw, len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_bits() {
        assert_eq!(FlockArg::from_bits(LOCK_SH), Ok(FlockArg::LockShared));
        assert_eq!(FlockArg::from_bits(LOCK_EX), Ok(FlockArg::LockExclusive));
        assert_eq!(FlockArg::from_bits(LOCK_UN), Ok(FlockArg::Unlock));
        assert_eq!(
            FlockArg::from_bits(LOCK_EX | LOCK_NB),
            Ok(FlockArg::LockExclusiveNonblock)
        );
        assert_eq!(
            FlockArg::from_bits(LOCK_UN | LOCK_NB),
            Ok(FlockArg::UnlockNonblock)
        );
    }

    #[test]
    fn malformed_operations() {
        for op in [0, LOCK_NB, LOCK_SH | LOCK_EX, LOCK_EX | LOCK_UN, 16, -1] {
            assert!(
                matches!(FlockArg::from_bits(op), Err(Error::InvalidArgument(_))),
                "{:#x} should be rejected",
                op
            );
        }
    }

    #[test]
    fn nonblocking_flag() {
        assert!(FlockArg::LockSharedNonblock.is_nonblocking());
        assert!(!FlockArg::LockExclusive.is_nonblocking());
    }

    #[test]
    fn negative_descriptor() {
        assert_eq!(
            flock(Descriptor::IGNORED, FlockArg::Unlock),
            Err(Error::BadDescriptor)
        );
    }
}
