use crate::sys::RawDescriptor;

/// A native I/O handle as the multiplexer and the lock adapter see it: a
/// file descriptor on Unix, a `HANDLE` or `SOCKET` value on Windows.
///
/// A negative value marks an entry the caller wants skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(RawDescriptor);

impl Descriptor {
    pub const IGNORED: Descriptor = Descriptor(-1);

    pub fn from_raw(raw: RawDescriptor) -> Descriptor {
        Descriptor(raw)
    }

    pub fn raw(self) -> RawDescriptor {
        self.0
    }

    pub fn is_ignored(self) -> bool {
        self.0 < 0
    }

    /// Resolves a C runtime descriptor. Negative values stay ignored.
    pub fn from_c(fd: libc::c_int) -> Descriptor {
        if fd < 0 {
            Descriptor::IGNORED
        } else {
            Descriptor(crate::sys::from_c_descriptor(fd))
        }
    }
}

#[cfg(unix)]
impl<T: std::os::unix::io::AsRawFd> From<&T> for Descriptor {
    fn from(source: &T) -> Self {
        Descriptor(source.as_raw_fd())
    }
}

#[cfg(windows)]
impl Descriptor {
    pub fn from_handle<T: std::os::windows::io::AsRawHandle>(source: &T) -> Descriptor {
        Descriptor(source.as_raw_handle() as RawDescriptor)
    }

    pub fn from_socket<T: std::os::windows::io::AsRawSocket>(source: &T) -> Descriptor {
        Descriptor(source.as_raw_socket() as RawDescriptor)
    }
}
