//! Readiness multiplexing over heterogeneous native handles.
//!
//! [`poll`] accepts sockets, pipe ends, console buffers and other waitable
//! handles in one call and reports readiness with the familiar `poll(2)`
//! bits. Each descriptor is classified by asking the platform what it is,
//! then probed the way that kind of handle allows.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::sys;

mod flags;
mod session;
mod timeout;

pub use self::flags::{PollFd, PollFlags};
pub use self::timeout::Timeout;

use self::session::Session;

/// Tunables for [`poll_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// How long to sleep before re-entering the wait after a wake-up that
    /// reported nothing.
    pub sleep_quantum: Duration,
    /// Upper bound on non-ignored entries per call.
    pub max_descriptors: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            sleep_quantum: Duration::from_millis(1),
            max_descriptors: sys::MAX_WAIT_OBJECTS,
        }
    }
}

/// Waits until at least one entry is ready or the timeout passes, then
/// overwrites every entry's `revents` and returns how many are non-empty.
///
/// Entries with a negative descriptor are skipped and come back with empty
/// `revents`. `POLLERR` and `POLLHUP` are reported whether or not they were
/// requested. A descriptor the platform cannot make sense of is reported
/// with `POLLERR` rather than failing the whole call.
pub fn poll(entries: &mut [PollFd], timeout: Timeout) -> Result<usize> {
    poll_with(entries, timeout, &PollConfig::default())
}

/// [`poll`] with explicit tunables.
pub fn poll_with(entries: &mut [PollFd], timeout: Timeout, config: &PollConfig) -> Result<usize> {
    if entries.len() > i32::MAX as usize {
        return Err(Error::InvalidArgument(format!(
            "too many entries: {}",
            entries.len()
        )));
    }
    let active = entries.iter().filter(|e| !e.fd().is_ignored()).count();
    if active > config.max_descriptors {
        return Err(Error::InvalidArgument(format!(
            "{} descriptors exceed the limit of {}",
            active, config.max_descriptors
        )));
    }

    Session::new(entries, timeout, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Descriptor;

    #[test]
    fn defaults() {
        let config = PollConfig::default();
        assert_eq!(config.sleep_quantum, Duration::from_millis(1));
        assert!(config.max_descriptors > 0);
    }

    #[test]
    fn empty_set() {
        assert_eq!(poll(&mut [], Timeout::Immediate), Ok(0));
    }

    #[test]
    fn over_the_limit() {
        let config = PollConfig {
            max_descriptors: 1,
            ..Default::default()
        };
        let mut entries = [
            PollFd::new(Descriptor::from_raw(0), PollFlags::POLLIN),
            PollFd::new(Descriptor::from_raw(1), PollFlags::POLLOUT),
        ];
        assert!(matches!(
            poll_with(&mut entries, Timeout::Immediate, &config),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn ignored_entries_do_not_count() {
        let config = PollConfig {
            max_descriptors: 0,
            ..Default::default()
        };
        let mut entries = [PollFd::ignored(), PollFd::ignored()];
        assert_eq!(poll_with(&mut entries, Timeout::Immediate, &config), Ok(0));
        assert!(entries.iter().all(|e| !e.any()));
    }
}
