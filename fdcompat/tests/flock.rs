#![cfg(unix)]

use std::fs::{File, OpenOptions};
use std::io::Write;

use fdcompat::flock::{flock, FlockArg};
use fdcompat::{Descriptor, Error};
use tempfile::NamedTempFile;

fn locked_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile failed");
    file.write_all(b"some bytes to lock").expect("write failed");
    file
}

fn open(file: &NamedTempFile) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("open failed")
}

#[test]
fn unlocking_an_unlocked_file_succeeds() {
    let file = locked_file();
    let handle = open(&file);
    assert_eq!(flock((&handle).into(), FlockArg::Unlock), Ok(()));
    assert_eq!(flock((&handle).into(), FlockArg::UnlockNonblock), Ok(()));
}

#[test]
fn shared_unlock_exclusive_in_sequence() {
    let file = locked_file();
    let handle = open(&file);
    assert_eq!(flock((&handle).into(), FlockArg::LockShared), Ok(()));
    assert_eq!(flock((&handle).into(), FlockArg::Unlock), Ok(()));
    assert_eq!(flock((&handle).into(), FlockArg::LockExclusive), Ok(()));
    assert_eq!(flock((&handle).into(), FlockArg::Unlock), Ok(()));
}

#[test]
fn bad_descriptor() {
    assert_eq!(
        flock(Descriptor::from_raw(100_000), FlockArg::LockShared),
        Err(Error::BadDescriptor)
    );
}

#[test]
fn exclusive_lock_on_read_only_handle() {
    let file = locked_file();
    let handle = File::open(file.path()).expect("open failed");
    assert_eq!(
        flock((&handle).into(), FlockArg::LockExclusiveNonblock),
        Ok(())
    );
    assert_eq!(flock((&handle).into(), FlockArg::Unlock), Ok(()));
}

#[test]
fn shared_lock_on_write_only_handle() {
    let file = locked_file();
    let handle = OpenOptions::new()
        .write(true)
        .open(file.path())
        .expect("open failed");
    assert_eq!(flock((&handle).into(), FlockArg::LockSharedNonblock), Ok(()));
    assert_eq!(flock((&handle).into(), FlockArg::Unlock), Ok(()));
}

#[test]
fn empty_file_locks_like_any_other() {
    let file = NamedTempFile::new().expect("tempfile failed");
    let first = open(&file);
    let second = open(&file);
    assert_eq!(flock((&first).into(), FlockArg::LockExclusive), Ok(()));
    assert_eq!(
        flock((&second).into(), FlockArg::LockSharedNonblock),
        Err(Error::WouldBlock)
    );
}

// Locks belong to the open file, so two handles in one process conflict.
mod per_handle {
    use super::*;

    #[test]
    fn exclusive_conflicts_until_released() {
        let file = locked_file();
        let first = open(&file);
        let second = open(&file);

        assert_eq!(flock((&first).into(), FlockArg::LockExclusive), Ok(()));
        assert_eq!(
            flock((&second).into(), FlockArg::LockExclusiveNonblock),
            Err(Error::WouldBlock)
        );
        assert_eq!(
            flock((&second).into(), FlockArg::LockSharedNonblock),
            Err(Error::WouldBlock)
        );

        assert_eq!(flock((&first).into(), FlockArg::Unlock), Ok(()));
        assert_eq!(
            flock((&second).into(), FlockArg::LockExclusiveNonblock),
            Ok(())
        );
    }

    #[test]
    fn shared_locks_coexist() {
        let file = locked_file();
        let first = open(&file);
        let second = open(&file);

        assert_eq!(flock((&first).into(), FlockArg::LockShared), Ok(()));
        assert_eq!(flock((&second).into(), FlockArg::LockSharedNonblock), Ok(()));
        assert_eq!(
            flock((&second).into(), FlockArg::LockExclusiveNonblock),
            Err(Error::WouldBlock)
        );
    }

    #[test]
    fn closing_the_handle_releases() {
        let file = locked_file();
        let second = open(&file);
        {
            let first = open(&file);
            assert_eq!(flock((&first).into(), FlockArg::LockExclusive), Ok(()));
        }
        assert_eq!(
            flock((&second).into(), FlockArg::LockExclusiveNonblock),
            Ok(())
        );
    }
}
