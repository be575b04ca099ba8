use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// How long a multiplexer call may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Probe once and return.
    Immediate,
    /// Block for at most this long.
    After(Duration),
    /// Block until something is ready.
    Never,
}

impl Timeout {
    /// Interprets a `poll(2)` style millisecond timeout: `0` probes once,
    /// `-1` waits forever, and any other negative value is rejected.
    pub fn from_millis(millis: i32) -> Result<Timeout> {
        match millis {
            0 => Ok(Timeout::Immediate),
            -1 => Ok(Timeout::Never),
            m if m > 0 => Ok(Timeout::After(Duration::from_millis(m as u64))),
            m => Err(Error::InvalidArgument(format!("negative timeout: {}", m))),
        }
    }

    pub(crate) fn deadline(self) -> Deadline {
        let now = Instant::now();
        Deadline {
            end: match self {
                Timeout::Immediate => Some(now),
                // Past the representable range is as good as forever.
                Timeout::After(d) => now.checked_add(d),
                Timeout::Never => None,
            },
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(d)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Timeout::Never, Timeout::from)
    }
}

/// A deadline fixed once at call entry. The wait loop asks it for the
/// remaining time on every round.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    pub(crate) fn is_infinite(&self) -> bool {
        self.end.is_none()
    }

    /// Time left, `None` for an infinite wait.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.end
            .map(|end| end.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(Timeout::from_millis(0), Ok(Timeout::Immediate));
        assert_eq!(Timeout::from_millis(-1), Ok(Timeout::Never));
        assert_eq!(
            Timeout::from_millis(1500),
            Ok(Timeout::After(Duration::from_millis(1500)))
        );
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            Timeout::from_millis(-2),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Timeout::from_millis(i32::MIN).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(Timeout::from(Duration::ZERO), Timeout::Immediate);
        assert_eq!(Timeout::from(None), Timeout::Never);
        assert_eq!(
            Timeout::from(Some(Duration::from_millis(5))),
            Timeout::After(Duration::from_millis(5))
        );
    }

    #[test]
    fn deadline_counts_down() {
        let deadline = Timeout::After(Duration::from_secs(60)).deadline();
        let remaining = deadline.remaining().expect("finite deadline");
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
        assert!(!deadline.is_infinite());
    }

    #[test]
    fn immediate_has_nothing_left() {
        assert_eq!(
            Timeout::Immediate.deadline().remaining(),
            Some(Duration::ZERO)
        );
        assert!(Timeout::Never.deadline().is_infinite());
        assert_eq!(Timeout::Never.deadline().remaining(), None);
    }
}
