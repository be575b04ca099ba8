//! Win32 and Winsock primitives.

use std::{
    io, mem, ptr,
    sync::OnceLock,
    time::{Duration, Instant},
};

use log::warn;
use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, BOOL, HANDLE},
    Networking::WinSock::{
        recv, select, WSAEnumNetworkEvents, WSAEventSelect, WSAGetLastError, FD_SET, SOCKET,
        TIMEVAL, WSANETWORKEVENTS,
    },
    Storage::FileSystem::{GetFileSizeEx, GetFileType, LockFileEx, UnlockFileEx},
    System::{
        Console::{GetConsoleMode, GetNumberOfConsoleInputEvents, PeekConsoleInputW, INPUT_RECORD},
        Pipes::PeekNamedPipe,
        Threading::{CreateEventW, SleepEx, WaitForSingleObject},
        IO::OVERLAPPED,
    },
    UI::WindowsAndMessaging::{
        DispatchMessageW, MsgWaitForMultipleObjects, PeekMessageW, TranslateMessage, MSG,
    },
};

use super::{ConsoleQueue, HandleKind, NetworkEvents, PeekOutcome, PipeState, Signal};
use crate::error::{Error, Result};
use crate::poll::PollFlags;

pub type RawDescriptor = isize;

/// `MAXIMUM_WAIT_OBJECTS` less the wake event and the message queue slot.
pub(crate) const MAX_WAIT_OBJECTS: usize = 62;

const FALSE: BOOL = 0;
const TRUE: BOOL = 1;

const NO_ERROR: u32 = 0;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
const ERROR_OUTOFMEMORY: u32 = 14;
const ERROR_LOCK_VIOLATION: u32 = 33;
const ERROR_INVALID_PARAMETER: u32 = 87;
const ERROR_BROKEN_PIPE: u32 = 109;
const ERROR_NOT_LOCKED: u32 = 158;

const WSAEINTR: i32 = 10004;
const WSAEBADF: i32 = 10009;
const WSAEINVAL: i32 = 10022;
const WSAEWOULDBLOCK: i32 = 10035;
const WSAENOTSOCK: i32 = 10038;
const WSAENETRESET: i32 = 10052;
const WSAECONNABORTED: i32 = 10053;
const WSAECONNRESET: i32 = 10054;
const WSAENOTCONN: i32 = 10057;
const WSAESHUTDOWN: i32 = 10058;

const FILE_TYPE_UNKNOWN: u32 = 0;
const FILE_TYPE_CHAR: u32 = 2;
const FILE_TYPE_PIPE: u32 = 3;

const WAIT_OBJECT_0: u32 = 0;
const WAIT_FAILED: u32 = 0xFFFF_FFFF;
const INFINITE: u32 = 0xFFFF_FFFF;
const QS_ALLINPUT: u32 = 0x04FF;
const PM_REMOVE: u32 = 0x0001;
const KEY_EVENT: u16 = 0x0001;

const MSG_PEEK: i32 = 0x2;
const SOCKET_ERROR: i32 = -1;
const LOCKFILE_FAIL_IMMEDIATELY: u32 = 0x1;
const LOCKFILE_EXCLUSIVE_LOCK: u32 = 0x2;

/// Maps a Win32 or Winsock error code to the closest POSIX errno.
fn posix_from_native(code: i32) -> i32 {
    match code as u32 {
        ERROR_INVALID_HANDLE => return libc::EBADF,
        ERROR_ACCESS_DENIED => return libc::EACCES,
        ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY => return libc::ENOMEM,
        ERROR_LOCK_VIOLATION => return libc::EWOULDBLOCK,
        ERROR_INVALID_PARAMETER => return libc::EINVAL,
        ERROR_BROKEN_PIPE => return libc::EPIPE,
        ERROR_NOT_LOCKED => return libc::ENOLCK,
        _ => (),
    }
    match code {
        WSAEINTR => libc::EINTR,
        WSAEBADF | WSAENOTSOCK => libc::EBADF,
        WSAEINVAL => libc::EINVAL,
        WSAEWOULDBLOCK => libc::EWOULDBLOCK,
        _ => libc::EIO,
    }
}

pub(crate) fn posix_errno(error: &io::Error) -> Option<i32> {
    error.raw_os_error().map(posix_from_native)
}

fn last_error() -> Error {
    Error::from_errno(posix_from_native(unsafe { GetLastError() } as i32))
}

/// Resolves a CRT descriptor. An unknown descriptor becomes the null handle,
/// which every later native call rejects.
pub(crate) fn from_c_descriptor(fd: libc::c_int) -> RawDescriptor {
    match unsafe { libc::get_osfhandle(fd) } {
        -1 => 0,
        handle => handle as RawDescriptor,
    }
}

fn millis(timeout: Option<Duration>) -> u32 {
    match timeout {
        None => INFINITE,
        Some(d) => d.as_micros().div_ceil(1000).min((INFINITE - 1) as u128) as u32,
    }
}

fn is_console(handle: HANDLE) -> bool {
    let mut mode = 0;
    unsafe { GetConsoleMode(handle, &mut mode) != 0 }
}

fn is_socket(handle: HANDLE) -> bool {
    if is_console(handle) {
        return false;
    }
    // Pipes and sockets look alike to most queries; only a socket gets its
    // event record overwritten.
    let mut ev: WSANETWORKEVENTS = unsafe { mem::zeroed() };
    ev.lNetworkEvents = 0xDEAD_BEEFu32 as i32;
    unsafe { WSAEnumNetworkEvents(handle as SOCKET, 0, &mut ev) };
    ev.lNetworkEvents != 0xDEAD_BEEFu32 as i32
}

pub(crate) fn classify(handle: HANDLE) -> io::Result<HandleKind> {
    if is_socket(handle) {
        return Ok(HandleKind::Socket);
    }
    let kind = match unsafe { GetFileType(handle) } {
        FILE_TYPE_UNKNOWN => match unsafe { GetLastError() } {
            NO_ERROR => HandleKind::Waitable,
            code => return Err(io::Error::from_raw_os_error(code as i32)),
        },
        FILE_TYPE_PIPE => HandleKind::Pipe,
        FILE_TYPE_CHAR if is_console(handle) => {
            let mut queued = 0;
            if unsafe { GetNumberOfConsoleInputEvents(handle, &mut queued) } != 0 {
                HandleKind::ConsoleInput
            } else {
                HandleKind::ConsoleOutput
            }
        }
        _ => HandleKind::Waitable,
    };
    Ok(kind)
}

pub(crate) fn peek_pipe(handle: HANDLE) -> PipeState {
    let mut avail = 0;
    let ok = unsafe {
        PeekNamedPipe(
            handle,
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            &mut avail,
            ptr::null_mut(),
        )
    };
    if ok != 0 {
        PipeState::Available(avail as usize)
    } else if unsafe { GetLastError() } == ERROR_BROKEN_PIPE {
        PipeState::Broken
    } else {
        PipeState::Unpeekable
    }
}

pub(crate) fn console_input(handle: HANDLE) -> ConsoleQueue {
    let mut queued = 0;
    if unsafe { GetNumberOfConsoleInputEvents(handle, &mut queued) } == 0 || queued == 0 {
        return ConsoleQueue::Empty;
    }

    let mut records: Vec<INPUT_RECORD> = Vec::with_capacity(queued as usize);
    let mut read = 0;
    let ok = unsafe { PeekConsoleInputW(handle, records.as_mut_ptr(), queued, &mut read) };
    if ok == 0 || read == 0 {
        return ConsoleQueue::Failed;
    }
    unsafe { records.set_len(read.min(queued) as usize) };

    // Key releases do not count.
    let pressed = records
        .iter()
        .any(|r| r.EventType == KEY_EVENT && unsafe { r.Event.KeyEvent.bKeyDown } != 0);
    if pressed {
        ConsoleQueue::KeyPressed
    } else {
        ConsoleQueue::NoKeys
    }
}

/// A signaled object carries no hang-up or error state of its own.
pub(crate) fn signal_state(handle: HANDLE, _sought: PollFlags) -> Signal {
    Signal {
        ready: unsafe { WaitForSingleObject(handle, 0) } == WAIT_OBJECT_0,
        ..Signal::default()
    }
}

pub(crate) fn peek_socket(handle: HANDLE) -> PeekOutcome {
    let mut data = [0u8; 64];
    let r = unsafe {
        recv(
            handle as SOCKET,
            data.as_mut_ptr(),
            data.len() as i32,
            MSG_PEEK,
        )
    };
    if r > 0 {
        return PeekOutcome::Data;
    }
    if r == 0 {
        return PeekOutcome::Eof;
    }
    match unsafe { WSAGetLastError() } {
        WSAENOTCONN => PeekOutcome::NotConnected,
        WSAESHUTDOWN | WSAECONNRESET | WSAECONNABORTED | WSAENETRESET => PeekOutcome::Hangup,
        _ => PeekOutcome::Failed,
    }
}

pub(crate) fn sleep(quantum: Duration) {
    unsafe { SleepEx(millis(Some(quantum)), TRUE) };
}

static WAKE_EVENT: OnceLock<HANDLE> = OnceLock::new();

/// The auto-reset event every socket registration signals. Created on first
/// use and kept for the life of the process.
fn wake_event() -> io::Result<HANDLE> {
    if let Some(event) = WAKE_EVENT.get() {
        return Ok(*event);
    }
    let event = unsafe { CreateEventW(ptr::null(), FALSE, FALSE, ptr::null()) };
    if event == 0 {
        return Err(io::Error::last_os_error());
    }
    let winner = *WAKE_EVENT.get_or_init(|| event);
    if winner != event {
        unsafe { CloseHandle(event) };
    }
    Ok(winner)
}

fn empty_set() -> FD_SET {
    unsafe { mem::zeroed() }
}

fn set_add(set: &mut FD_SET, socket: SOCKET) {
    let count = set.fd_count as usize;
    if count < set.fd_array.len() && !set.fd_array[..count].contains(&socket) {
        set.fd_array[count] = socket;
        set.fd_count += 1;
    }
}

fn set_contains(set: &FD_SET, socket: SOCKET) -> bool {
    set.fd_array[..set.fd_count as usize].contains(&socket)
}

struct Registration {
    socket: SOCKET,
    fired: NetworkEvents,
}

/// One session's native registrations: sockets tied to the shared wake
/// event plus the other handles to wait on directly. Dropping it detaches
/// every socket from the event.
pub(crate) struct NativeWait {
    event: HANDLE,
    handles: Vec<HANDLE>,
    sockets: Vec<Registration>,
    rfds: FD_SET,
    wfds: FD_SET,
    xfds: FD_SET,
}

impl NativeWait {
    pub(crate) fn new() -> io::Result<NativeWait> {
        Ok(NativeWait {
            event: wake_event()?,
            handles: Vec::new(),
            sockets: Vec::new(),
            rfds: empty_set(),
            wfds: empty_set(),
            xfds: empty_set(),
        })
    }

    pub(crate) fn add_socket(&mut self, handle: HANDLE, requested: NetworkEvents) -> io::Result<()> {
        let socket = handle as SOCKET;
        if unsafe { WSAEventSelect(socket, self.event, requested.bits()) } == SOCKET_ERROR {
            return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }));
        }
        self.sockets.push(Registration {
            socket,
            fired: NetworkEvents::empty(),
        });

        if requested.intersects(NetworkEvents::READ | NetworkEvents::ACCEPT) {
            set_add(&mut self.rfds, socket);
        }
        if requested.intersects(NetworkEvents::WRITE | NetworkEvents::CONNECT) {
            set_add(&mut self.wfds, socket);
        }
        if requested.contains(NetworkEvents::OOB) {
            set_add(&mut self.xfds, socket);
        }
        Ok(())
    }

    pub(crate) fn add_handle(&mut self, handle: HANDLE, _sought: PollFlags) {
        self.handles.push(handle);
    }

    pub(crate) fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// A zero-timeout `select` over copies of the interest sets, recording
    /// what it finds. Returns true when any socket is ready.
    pub(crate) fn poll_sockets(&mut self) -> io::Result<bool> {
        if self.sockets.is_empty() {
            return Ok(false);
        }
        let (mut rfds, mut wfds, mut xfds) = (self.rfds, self.wfds, self.xfds);
        let tv0 = TIMEVAL {
            tv_sec: 0,
            tv_usec: 0,
        };
        let rc = unsafe { select(0, &mut rfds, &mut wfds, &mut xfds, &tv0) };
        if rc == SOCKET_ERROR {
            return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }));
        }
        if rc == 0 {
            return Ok(false);
        }
        for reg in self.sockets.iter_mut() {
            if set_contains(&rfds, reg.socket) {
                reg.fired |= NetworkEvents::READ | NetworkEvents::ACCEPT;
            }
            if set_contains(&wfds, reg.socket) {
                reg.fired |= NetworkEvents::WRITE | NetworkEvents::CONNECT;
            }
            if set_contains(&xfds, reg.socket) {
                reg.fired |= NetworkEvents::OOB;
            }
        }
        Ok(true)
    }

    /// Waits on the wake event and the registered handles, dispatching any
    /// window messages that arrive meanwhile. Messages never end the wait.
    pub(crate) fn wait(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let mut objects = Vec::with_capacity(self.handles.len() + 1);
        objects.push(self.event);
        objects.extend_from_slice(&self.handles);
        let count = objects.len() as u32;
        let end = timeout.and_then(|d| Instant::now().checked_add(d));

        loop {
            let remaining = match (timeout, end) {
                (None, _) => None,
                (Some(d), None) => Some(d),
                (Some(_), Some(end)) => Some(end.saturating_duration_since(Instant::now())),
            };
            let ret = unsafe {
                MsgWaitForMultipleObjects(
                    count,
                    objects.as_ptr(),
                    FALSE,
                    millis(remaining),
                    QS_ALLINPUT,
                )
            };
            if ret == WAIT_FAILED {
                return Err(io::Error::last_os_error());
            }
            if ret != WAIT_OBJECT_0 + count {
                return Ok(());
            }
            drain_messages();
        }
    }

    /// Collects the network events fired since registration.
    pub(crate) fn refresh_sockets(&mut self) -> io::Result<()> {
        self.poll_sockets()?;
        for reg in self.sockets.iter_mut() {
            let mut ev: WSANETWORKEVENTS = unsafe { mem::zeroed() };
            if unsafe { WSAEnumNetworkEvents(reg.socket, 0, &mut ev) } == SOCKET_ERROR {
                warn!(
                    "enumerating events on socket {} failed: error {}",
                    reg.socket,
                    unsafe { WSAGetLastError() }
                );
                continue;
            }
            reg.fired |= NetworkEvents::from_bits_truncate(ev.lNetworkEvents);
        }
        Ok(())
    }

    pub(crate) fn socket_events(&mut self, handle: HANDLE) -> NetworkEvents {
        let socket = handle as SOCKET;
        let mut fired = NetworkEvents::empty();
        for reg in self.sockets.iter().filter(|reg| reg.socket == socket) {
            fired |= reg.fired;
        }
        // The select pass reports readable as both; the event record knows
        // which one actually happened.
        if fired.contains(NetworkEvents::READ | NetworkEvents::ACCEPT) {
            fired.remove(NetworkEvents::ACCEPT);
        }
        fired
    }
}

impl Drop for NativeWait {
    fn drop(&mut self) {
        for reg in &self.sockets {
            if unsafe { WSAEventSelect(reg.socket, 0, 0) } == SOCKET_ERROR {
                warn!(
                    "detaching socket {} from wake event failed: error {}",
                    reg.socket,
                    unsafe { WSAGetLastError() }
                );
            }
        }
    }
}

fn drain_messages() {
    let mut msg: MSG = unsafe { mem::zeroed() };
    while unsafe { PeekMessageW(&mut msg, 0, 0, 0, PM_REMOVE) } != 0 {
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

pub(crate) fn file_size(handle: HANDLE) -> Result<u64> {
    let mut size: i64 = 0;
    if unsafe { GetFileSizeEx(handle, &mut size) } == 0 {
        return Err(last_error());
    }
    Ok(size as u64)
}

fn split(len: u64) -> (u32, u32) {
    (len as u32, (len >> 32) as u32)
}

pub(crate) fn lock_range(handle: HANDLE, len: u64, exclusive: bool, nonblocking: bool) -> Result<()> {
    let mut flags = 0;
    if nonblocking {
        flags |= LOCKFILE_FAIL_IMMEDIATELY;
    }
    if exclusive {
        flags |= LOCKFILE_EXCLUSIVE_LOCK;
    }
    // Offset zero; the rest of the structure must be clear as well.
    let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
    let (low, high) = split(len);
    if unsafe { LockFileEx(handle, flags, 0, low, high, &mut overlapped) } != 0 {
        return Ok(());
    }
    match unsafe { GetLastError() } {
        ERROR_LOCK_VIOLATION if nonblocking => Err(Error::WouldBlock),
        code => Err(Error::from_errno(posix_from_native(code as i32))),
    }
}

pub(crate) fn unlock_range(handle: HANDLE, len: u64) -> Result<()> {
    let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
    let (low, high) = split(len);
    if unsafe { UnlockFileEx(handle, 0, low, high, &mut overlapped) } != 0 {
        return Ok(());
    }
    // A range that is not locked as a whole, including one that grew since
    // it was locked, fails with ENOLCK.
    Err(last_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_codes() {
        assert_eq!(posix_from_native(ERROR_INVALID_HANDLE as i32), libc::EBADF);
        assert_eq!(posix_from_native(ERROR_LOCK_VIOLATION as i32), libc::EWOULDBLOCK);
        assert_eq!(posix_from_native(WSAEWOULDBLOCK), libc::EWOULDBLOCK);
        assert_eq!(posix_from_native(ERROR_NOT_LOCKED as i32), libc::ENOLCK);
        assert_eq!(
            Error::from_errno(posix_from_native(ERROR_NOT_LOCKED as i32)),
            Error::Native(libc::ENOLCK)
        );
        assert_eq!(posix_from_native(424242), libc::EIO);
    }

    #[test]
    fn split_extent() {
        assert_eq!(split(0), (0, 0));
        assert_eq!(split(0x1_0000_0002), (2, 1));
    }

    #[test]
    fn null_handle_does_not_classify() {
        assert!(classify(0).is_err());
    }
}
