#![cfg(unix)]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::{AsRawFd, FromRawFd};

use fdcompat::ffi::{fdcompat_errno, fdcompat_flock, fdcompat_poll, pollfd};
use fdcompat::flock::{LOCK_EX, LOCK_NB, LOCK_SH, LOCK_UN};
use fdcompat::poll::PollFlags;

fn pipe() -> (File, File) {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "pipe failed");
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

#[test]
fn poll_table() {
    let (reader, mut writer) = pipe();
    writer.write_all(b"x").expect("write failed");

    let mut table = [
        pollfd {
            fd: reader.as_raw_fd(),
            events: PollFlags::POLLIN.bits(),
            revents: 0,
        },
        pollfd {
            fd: -1,
            events: PollFlags::POLLIN.bits(),
            revents: 0,
        },
        pollfd {
            fd: writer.as_raw_fd(),
            events: PollFlags::POLLOUT.bits(),
            revents: 0,
        },
    ];
    let rc = unsafe { fdcompat_poll(table.as_mut_ptr(), table.len() as libc::c_ulong, 100) };
    assert_eq!(rc, 2);
    assert_eq!(table[0].revents, libc::POLLIN);
    assert_eq!(table[1].revents, 0);
    assert_eq!(table[2].revents, libc::POLLOUT);
}

#[test]
fn lock_sequence() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile failed");
    file.write_all(b"locked").expect("write failed");
    let handle = OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("open failed");
    let fd = handle.as_raw_fd();

    assert_eq!(fdcompat_flock(fd, LOCK_SH), 0);
    assert_eq!(fdcompat_flock(fd, LOCK_UN), 0);
    assert_eq!(fdcompat_flock(fd, LOCK_EX | LOCK_NB), 0);
    assert_eq!(fdcompat_flock(fd, LOCK_UN), 0);
}

#[test]
fn conflict_sets_errno() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile failed");
    file.write_all(b"locked").expect("write failed");
    let open = || {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(file.path())
            .expect("open failed")
    };
    let first = open();
    let second = open();

    assert_eq!(fdcompat_flock(first.as_raw_fd(), LOCK_EX), 0);
    assert_eq!(fdcompat_flock(second.as_raw_fd(), LOCK_EX | LOCK_NB), -1);
    assert_eq!(fdcompat_errno(), libc::EWOULDBLOCK);
}

#[test]
fn exclusive_lock_on_read_only_descriptor() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile failed");
    file.write_all(b"locked").expect("write failed");
    let handle = File::open(file.path()).expect("open failed");

    assert_eq!(fdcompat_flock(handle.as_raw_fd(), LOCK_EX | LOCK_NB), 0);
    assert_eq!(fdcompat_flock(handle.as_raw_fd(), LOCK_UN), 0);
}
