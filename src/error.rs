//! Errors surfaced by the servers.
//!
//! None of them is recovered from: each one ends the process that hit it.

use std::fmt;
use std::io;

use crate::config::ConfigError;

#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    /// The listening socket could not be created or bound.
    Bind { addr: String, source: io::Error },
    /// `accept` failed on the listening socket.
    Accept(io::Error),
    /// A process replica could not be created or waited for.
    Fork(io::Error),
    /// The async runtime could not be built or the listener handed to it.
    Runtime(io::Error),
}

impl Error {
    /// True when a bind failed because another socket already owns the port.
    pub fn is_addr_in_use(&self) -> bool {
        matches!(self, Error::Bind { source, .. } if source.kind() == io::ErrorKind::AddrInUse)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{e}"),
            Error::Bind { addr, source } => write!(f, "Failed to bind '{addr}': {source}"),
            Error::Accept(e) => write!(f, "Failed to accept connection: {e}"),
            Error::Fork(e) => write!(f, "Failed to manage process replica: {e}"),
            Error::Runtime(e) => write!(f, "Async runtime failure: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Bind { source, .. } => Some(source),
            Error::Accept(e) | Error::Fork(e) | Error::Runtime(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}
