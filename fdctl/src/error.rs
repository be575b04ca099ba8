use std::convert::From;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error(transparent)]
    Compat(#[from] fdcompat::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(format!("{}", error))
    }
}

impl From<getopts::Fail> for Error {
    fn from(error: getopts::Fail) -> Self {
        Error::Usage(format!("could not parse arguments: {}", error))
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Usage(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Usage(error.to_string())
    }
}
