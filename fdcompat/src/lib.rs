//! # `fdcompat`
//!
//! `poll(2)` and `flock(2)` for platforms whose native handles do not speak
//! POSIX: sockets, anonymous pipes, console input and screen buffers, and
//! plain waitable handles can all be multiplexed in one [`poll`](poll::poll)
//! call, and whole-file locks are expressed with native byte-range locks.
//!
//! # Readiness
//!
//! Readiness is reported with the POSIX `POLL*` bits. Each kind of handle is
//! probed the way it allows:
//!
//! - sockets: network event registration, with a non-destructive peek to
//!   tell data from a hang-up;
//! - pipes: a non-destructive peek for queued bytes. Write space cannot be
//!   measured, so a pipe end that cannot be peeked is reported writable;
//! - console input: readable once a key press is queued;
//! - console screen buffers: always writable;
//! - anything else: its signaled state.
//!
//! # Locking
//!
//! [`flock`](flock::flock) locks the range from offset zero to the current
//! file size, recomputed on every call.
//!
//! # C surface
//!
//! The [`ffi`] module exports `fdcompat_poll`, `fdcompat_flock` and
//! `fdcompat_errno` with the usual return conventions.

mod descriptor;
mod error;
mod pollable;
mod sys;

pub mod ffi;
pub mod flock;
pub mod poll;

pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use sys::RawDescriptor;
