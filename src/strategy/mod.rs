//! Connection scheduling strategies.
//!
//! All strategies consume an already-bound listener and share the same
//! per-connection behavior (`handler::serve`). What differs is who runs the
//! accept loop and who runs the handler:
//! - `serial`: the calling thread does both
//! - `threaded`: the calling thread accepts, a fresh thread handles
//! - `process`: forked replicas each run their own serial loop
//! - `tasks`: a Tokio runtime accepts, a task handles

pub mod serial;
pub mod tasks;
pub mod threaded;

#[cfg(unix)]
pub mod process;

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info};

use crate::config::Config;
use crate::Error;

/// How accepted connections are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Serial,
    Threaded,
    Process,
    Tasks,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Serial => "serial",
            Strategy::Threaded => "threaded",
            Strategy::Process => "process",
            Strategy::Tasks => "tasks",
        };
        f.write_str(name)
    }
}

/// Serve `listener` with `strategy` until the accept limit is reached, or
/// forever when there is none.
pub fn run(strategy: Strategy, listener: TcpListener, config: &Config) -> Result<(), Error> {
    let limit = config.accept_limit;

    match strategy {
        Strategy::Serial => {
            let served = serial::serve(&listener, limit)?;
            info!(served, "Serial server finished");
        }
        Strategy::Threaded => {
            let served = threaded::serve(&listener, limit)?;
            info!(served, "Threaded server finished");
        }
        Strategy::Tasks => {
            let served = tasks::serve(listener, limit)?;
            info!(served, "Task server finished");
        }
        #[cfg(unix)]
        Strategy::Process => {
            let report = process::serve(&listener, config.replicas, limit)?;
            info!(
                replicas = report.replicas.len(),
                failed = report.failed().count(),
                "Forking server finished"
            );
        }
        #[cfg(not(unix))]
        Strategy::Process => {
            return Err(Error::Fork(io::Error::new(
                io::ErrorKind::Unsupported,
                "process replication requires a unix platform",
            )));
        }
    }

    Ok(())
}

/// Blocking accept loop used by the thread and process based strategies.
///
/// Stops after `limit` connections when set. Returns the number accepted; an
/// accept failure ends the loop.
pub(crate) fn accept_loop<F>(
    listener: &TcpListener,
    limit: Option<usize>,
    mut on_connection: F,
) -> io::Result<usize>
where
    F: FnMut(TcpStream, SocketAddr),
{
    let mut accepted = 0;

    while limit.map_or(true, |max| accepted < max) {
        let (stream, peer) = listener.accept()?;
        accepted += 1;
        debug!(peer = %peer, accepted, "New connection");
        on_connection(stream, peer);
    }

    Ok(accepted)
}
