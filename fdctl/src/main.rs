use std::fs::{File, OpenOptions};
use std::thread;

use log::debug;

use fdcompat::flock::{flock, FlockArg};
use fdcompat::poll::{poll, PollFd};
use fdcompat::Descriptor;

mod config;
mod error;

use crate::config::{Command, LockConfig, WaitConfig};
use crate::error::Error;

/// Waits on the inherited descriptors, printing each ready one. Returns
/// whether anything was ready before the timeout.
fn wait(config: &WaitConfig) -> Result<bool, Error> {
    let mut entries: Vec<PollFd> = config
        .descriptors
        .iter()
        .map(|&(fd, events)| PollFd::new(Descriptor::from_c(fd), events))
        .collect();

    let ready = poll(&mut entries, config.timeout)?;
    for ((fd, _), entry) in config.descriptors.iter().zip(&entries) {
        if entry.any() {
            println!("{} {:#x}", fd, entry.revents().bits());
        }
    }
    Ok(ready > 0)
}

#[cfg(unix)]
fn descriptor(file: &File) -> Descriptor {
    file.into()
}

#[cfg(windows)]
fn descriptor(file: &File) -> Descriptor {
    Descriptor::from_handle(file)
}

fn lock(config: &LockConfig) -> Result<(), Error> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&config.path)?;
    let fd = descriptor(&file);

    flock(fd, config.arg)?;
    debug!("applied {:?} to {}", config.arg, config.path);

    if !config.hold.is_zero() {
        thread::sleep(config.hold);
    }
    match config.arg {
        FlockArg::Unlock | FlockArg::UnlockNonblock => Ok(()),
        _ => Ok(flock(fd, FlockArg::Unlock)?),
    }
}

fn main() {
    env_logger::init();

    let command = match config::read_config() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let code = match command {
        Command::Help(usage) => {
            println!("{}", usage);
            0
        }
        Command::Wait(config) => match wait(&config) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("error: {}", e);
                2
            }
        },
        Command::Lock(config) => match lock(&config) {
            Ok(()) => 0,
            Err(Error::Compat(fdcompat::Error::WouldBlock)) => {
                eprintln!("would block");
                1
            }
            Err(e) => {
                eprintln!("error: {}", e);
                2
            }
        },
    };
    std::process::exit(code);
}
