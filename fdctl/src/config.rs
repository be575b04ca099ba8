use std::env;
use std::str::FromStr;
use std::time::Duration;

use getopts::{Matches, Options};

use fdcompat::flock::FlockArg;
use fdcompat::poll::{PollFlags, Timeout};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Timeout,
    /// Descriptors and the events requested for each, in first-seen order.
    pub descriptors: Vec<(i32, PollFlags)>,
}

impl WaitConfig {
    fn add(&mut self, fd: i32, events: PollFlags) {
        match self.descriptors.iter_mut().find(|(known, _)| *known == fd) {
            Some((_, existing)) => *existing |= events,
            None => self.descriptors.push((fd, events)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    pub path: String,
    pub arg: FlockArg,
    pub hold: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help(String),
    Wait(WaitConfig),
    Lock(LockConfig),
}

fn usage(program: &str, command: &str, opts: &Options) -> String {
    let brief = match command {
        "wait" => format!("Usage: {} wait [options]", program),
        "lock" => format!("Usage: {} lock [options] FILE", program),
        _ => format!("Usage: {} wait|lock [options]", program),
    };
    opts.usage(&brief)
}

fn wait_options() -> Options {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "t",
        "timeout",
        "milliseconds to wait, -1 waits forever (default)",
        "MS",
    );
    opts.optmulti("r", "read", "wait for the descriptor to be readable", "FD");
    opts.optmulti("w", "write", "wait for the descriptor to be writable", "FD");
    opts.optmulti("p", "priority", "wait for out-of-band data", "FD");
    opts
}

fn lock_options() -> Options {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optflag("s", "shared", "take a shared lock");
    opts.optflag("x", "exclusive", "take an exclusive lock (default)");
    opts.optflag("u", "unlock", "release the lock");
    opts.optflag("n", "nonblock", "fail instead of waiting for a conflicting lock");
    opts.optopt("", "hold", "milliseconds to hold the lock", "MS");
    opts
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::Usage(format!("invalid {}: {}", name, value)))
}

fn parse_wait(matches: &Matches) -> Result<WaitConfig, Error> {
    let timeout = match matches.opt_str("timeout") {
        Some(ms) => Timeout::from_millis(parse_num("timeout", &ms)?)?,
        None => Timeout::Never,
    };

    let mut config = WaitConfig {
        timeout,
        descriptors: Vec::new(),
    };
    for (opt, events) in [
        ("read", PollFlags::POLLIN),
        ("write", PollFlags::POLLOUT),
        ("priority", PollFlags::POLLPRI),
    ] {
        for fd in matches.opt_strs(opt) {
            config.add(parse_num("descriptor", &fd)?, events);
        }
    }
    if config.descriptors.is_empty() {
        return Err("no descriptors to wait for".into());
    }
    Ok(config)
}

fn parse_lock(matches: &Matches) -> Result<LockConfig, Error> {
    let nonblock = matches.opt_present("nonblock");
    let modes = ["shared", "exclusive", "unlock"]
        .iter()
        .filter(|m| matches.opt_present(m))
        .count();
    if modes > 1 {
        return Err("only one of --shared, --exclusive and --unlock may be given".into());
    }

    let arg = if matches.opt_present("shared") {
        if nonblock {
            FlockArg::LockSharedNonblock
        } else {
            FlockArg::LockShared
        }
    } else if matches.opt_present("unlock") {
        if nonblock {
            FlockArg::UnlockNonblock
        } else {
            FlockArg::Unlock
        }
    } else if nonblock {
        FlockArg::LockExclusiveNonblock
    } else {
        FlockArg::LockExclusive
    };

    let hold = match matches.opt_str("hold") {
        Some(ms) => Duration::from_millis(parse_num("hold time", &ms)?),
        None => Duration::ZERO,
    };

    let path = match matches.free.as_slice() {
        [path] => path.clone(),
        [] => return Err("no file to lock".into()),
        _ => return Err("only one file can be locked".into()),
    };

    Ok(LockConfig { path, arg, hold })
}

/// Parses a full argument vector, program name included.
pub fn parse_args(args: &[String]) -> Result<Command, Error> {
    let program = args.first().map(String::as_str).unwrap_or("fdctl");
    let command = args.get(1).map(String::as_str).unwrap_or("");

    let opts = match command {
        "wait" => wait_options(),
        "lock" => lock_options(),
        "-h" | "--help" => return Ok(Command::Help(usage(program, "", &Options::new()))),
        "" => return Err(usage(program, "", &Options::new()).into()),
        other => return Err(format!("unknown command: {}", other).into()),
    };

    let matches = opts.parse(&args[2..])?;
    if matches.opt_present("help") {
        return Ok(Command::Help(usage(program, command, &opts)));
    }

    match command {
        "wait" => parse_wait(&matches).map(Command::Wait),
        _ => parse_lock(&matches).map(Command::Lock),
    }
}

pub fn read_config() -> Result<Command, Error> {
    let args: Vec<String> = env::args().collect();
    parse_args(&args)
}
