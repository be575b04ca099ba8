use std::time::Duration;

use log::{debug, trace, warn};

use super::timeout::{Deadline, Timeout};
use super::{PollConfig, PollFd, PollFlags};
use crate::error::Result;
use crate::pollable::{self, Pollable};
use crate::sys::{self, NativeWait};

enum Slot {
    Ignored,
    /// Native introspection failed; reported as an error every round.
    Unresolved,
    Probe(Box<dyn Pollable>),
}

/// The state of one multiplexer call. Descriptors are classified once, up
/// front; native registrations live only for a single round of the wait
/// loop.
pub(crate) struct Session<'a> {
    entries: &'a mut [PollFd],
    slots: Vec<Slot>,
    deadline: Deadline,
    config: &'a PollConfig,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        entries: &'a mut [PollFd],
        timeout: Timeout,
        config: &'a PollConfig,
    ) -> Session<'a> {
        let deadline = timeout.deadline();
        let slots = entries
            .iter()
            .map(|entry| {
                if entry.fd().is_ignored() {
                    return Slot::Ignored;
                }
                match pollable::classify(entry.fd()) {
                    Ok(probe) => Slot::Probe(probe),
                    Err(e) => {
                        warn!("descriptor {} cannot be classified: {}", entry.fd().raw(), e);
                        Slot::Unresolved
                    }
                }
            })
            .collect();

        Session {
            entries,
            slots,
            deadline,
            config,
        }
    }

    pub(crate) fn run(mut self) -> Result<usize> {
        loop {
            let mut revents = vec![PollFlags::empty(); self.entries.len()];
            let mut wait = NativeWait::new()?;

            let mut ready = false;
            for (idx, slot) in self.slots.iter_mut().enumerate() {
                revents[idx] = match slot {
                    Slot::Ignored => PollFlags::empty(),
                    Slot::Unresolved => PollFlags::POLLERR,
                    Slot::Probe(probe) => probe.probe(self.entries[idx].events(), &mut wait),
                };
                ready |= !revents[idx].is_empty();
            }

            let pending = wait.poll_sockets().unwrap_or_else(|e| {
                warn!("socket pre-check failed: {}", e);
                false
            });
            let timeout = if ready || pending {
                Some(Duration::ZERO)
            } else {
                self.deadline.remaining()
            };
            wait.wait(timeout)?;

            if let Err(e) = wait.refresh_sockets() {
                warn!("collecting socket events failed: {}", e);
            }
            for (idx, slot) in self.slots.iter_mut().enumerate() {
                if let Slot::Probe(probe) = slot {
                    let woke = probe.consume_wake(self.entries[idx].events(), &mut wait);
                    if !woke.is_empty() {
                        trace!("descriptor {} ready: {:?}", probe.fd(), woke);
                    }
                    revents[idx] |= woke;
                }
            }

            let count = revents.iter().filter(|r| !r.is_empty()).count();
            if count == 0 && self.should_restart(timeout, wait.handle_count()) {
                debug!("nothing ready, restarting wait");
                drop(wait);
                sys::sleep(self.config.sleep_quantum);
                continue;
            }

            for (entry, revents) in self.entries.iter_mut().zip(revents) {
                entry.set_revents(revents);
            }
            return Ok(count);
        }
    }

    /// A non-socket handle can end the wait without anything to report, so
    /// such a wake-up goes around again while time remains.
    fn should_restart(&self, waited: Option<Duration>, handles: usize) -> bool {
        if self.deadline.is_infinite() {
            return true;
        }
        let waited = waited.map_or(true, |d| !d.is_zero());
        let left = self.deadline.remaining().map_or(true, |d| !d.is_zero());
        waited && left && handles > 0
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!("poll session over {} descriptors done", self.slots.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restarts(timeout: Timeout, waited: Option<Duration>, handles: usize) -> bool {
        let config = PollConfig::default();
        let mut entries: [PollFd; 0] = [];
        let restart = Session::new(&mut entries, timeout, &config).should_restart(waited, handles);
        restart
    }

    #[test]
    fn infinite_wait_always_restarts() {
        assert!(restarts(Timeout::Never, None, 0));
        assert!(restarts(Timeout::Never, None, 3));
    }

    #[test]
    fn finite_wait_restarts_only_after_blocking_on_a_handle() {
        let timeout = Timeout::After(Duration::from_secs(10));
        let waited = Some(Duration::from_secs(10));
        assert!(restarts(timeout, waited, 1));
        assert!(!restarts(timeout, waited, 0));
        assert!(!restarts(timeout, Some(Duration::ZERO), 1));
    }

    #[test]
    fn immediate_poll_never_restarts() {
        assert!(!restarts(Timeout::Immediate, Some(Duration::ZERO), 1));
    }
}
