use std::convert::From;

use thiserror::Error as ThisError;

/// Failure classification shared by the multiplexer and the lock adapter.
///
/// Every variant maps onto a POSIX errno through [`Error::errno`], which is
/// what the C surface reports through its side channel.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bad descriptor")]
    BadDescriptor,

    #[error("operation would block")]
    WouldBlock,

    #[error("native error (errno {0})")]
    Native(i32),

    #[error("i/o error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies a POSIX errno value.
    pub fn from_errno(errno: i32) -> Error {
        match errno {
            libc::EBADF => Error::BadDescriptor,
            libc::EINVAL => Error::InvalidArgument("rejected by the platform".to_string()),
            libc::EWOULDBLOCK => Error::WouldBlock,
            errno => Error::Native(errno),
        }
    }

    /// The POSIX errno closest to this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::BadDescriptor => libc::EBADF,
            Error::WouldBlock => libc::EWOULDBLOCK,
            Error::Native(errno) => *errno,
            Error::Io(_) => libc::EIO,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match crate::sys::posix_errno(&error) {
            Some(errno) => Error::from_errno(errno),
            None => Error::Io(error.to_string()),
        }
    }
}

#[cfg(unix)]
impl From<nix::Error> for Error {
    fn from(error: nix::Error) -> Self {
        Error::from_errno(error as i32)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::InvalidArgument(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classification() {
        assert_eq!(Error::from_errno(libc::EBADF), Error::BadDescriptor);
        assert_eq!(Error::from_errno(libc::EWOULDBLOCK), Error::WouldBlock);
        assert_eq!(Error::from_errno(libc::EIO), Error::Native(libc::EIO));
        assert!(matches!(
            Error::from_errno(libc::EINVAL),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn errno_round_trip() {
        for errno in [libc::EBADF, libc::EWOULDBLOCK, libc::EINVAL, libc::EACCES] {
            assert_eq!(Error::from_errno(errno).errno(), errno);
        }
    }

    #[test]
    fn from_io_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err, Error::Io("boom".to_string()));
    }
}
