//! Multi-process server sharing one bound socket.
//!
//! The parent binds, answers exactly one connection itself, then forks
//! `replicas` copies of itself. Each replica inherits the listening
//! descriptor and runs an independent serial accept loop on it; the kernel
//! picks which blocked replica receives a given connection. The parent only
//! waits for its replicas to exit.
//!
//! Replicas are never respawned.

use libc::pid_t;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::accept_loop;
use crate::greeting::ServerId;
use crate::handler;
use crate::Error;

/// How a replica terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaStatus {
    Exited(i32),
    Signaled(i32),
}

impl ReplicaStatus {
    pub fn success(&self) -> bool {
        matches!(self, ReplicaStatus::Exited(0))
    }
}

/// A replica the parent waited for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaExit {
    pub id: ServerId,
    pub pid: pid_t,
    pub status: ReplicaStatus,
}

/// Outcome of a forking server run, as seen by the parent.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub replicas: Vec<ReplicaExit>,
}

impl ProcessReport {
    pub fn failed(&self) -> impl Iterator<Item = &ReplicaExit> {
        self.replicas.iter().filter(|r| !r.status.success())
    }
}

enum Forked {
    Child,
    Parent(pid_t),
}

/// Run the forking server in the calling process.
///
/// Returns in the parent once every replica has exited. Replicas never
/// return from this call. `limit` bounds each replica's accept loop.
pub fn serve(
    listener: &TcpListener,
    replicas: usize,
    limit: Option<usize>,
) -> Result<ProcessReport, Error> {
    accept_loop(listener, Some(1), |stream, peer| {
        respond(stream, peer, ServerId::PARENT);
    })
    .map_err(Error::Accept)?;

    let mut children = Vec::with_capacity(replicas);
    let mut fork_error = None;

    for index in 1..=replicas {
        let id = ServerId(index);
        match fork() {
            Ok(Forked::Child) => run_replica(listener, id, limit),
            Ok(Forked::Parent(pid)) => {
                info!(server_id = %id, pid, "Forked replica");
                children.push((id, pid));
            }
            Err(e) => {
                error!(server_id = %id, error = %e, "Failed to fork replica");
                fork_error = Some(e);
                break;
            }
        }
    }

    let (report, wait_error) = wait_all(children);

    match fork_error.or(wait_error) {
        Some(e) => Err(Error::Fork(e)),
        None => Ok(report),
    }
}

/// Wait for every child, even after a `waitpid` failure, and return the
/// first failure alongside the exits that were collected.
fn wait_all(children: Vec<(ServerId, pid_t)>) -> (ProcessReport, Option<io::Error>) {
    let mut report = ProcessReport::default();
    let mut first_error = None;

    for (id, pid) in children {
        match wait_for(pid) {
            Ok(status) => {
                if status.success() {
                    info!(server_id = %id, pid, "Replica exited");
                } else {
                    warn!(server_id = %id, pid, status = ?status, "Replica exited abnormally");
                }
                report.replicas.push(ReplicaExit { id, pid, status });
            }
            Err(e) => {
                error!(server_id = %id, pid, error = %e, "Failed to wait for replica");
                first_error.get_or_insert(e);
            }
        }
    }

    (report, first_error)
}

fn respond(stream: TcpStream, peer: SocketAddr, id: ServerId) {
    if let Err(e) = handler::serve(stream, Some(id)) {
        debug!(server_id = %id, peer = %peer, error = %e, "Connection error");
    }
}

/// Body of a forked replica. Terminates the process instead of returning so
/// the caller's remaining code only ever runs in the parent.
fn run_replica(listener: &TcpListener, id: ServerId, limit: Option<usize>) -> ! {
    let code = match accept_loop(listener, limit, |stream, peer| respond(stream, peer, id)) {
        Ok(served) => {
            info!(server_id = %id, served, "Replica finished");
            0
        }
        Err(e) => {
            error!(server_id = %id, error = %e, "Replica accept failed");
            1
        }
    };

    // SAFETY: `_exit` skips atexit handlers and destructors that belong to
    // the parent's copy of the process state.
    unsafe { libc::_exit(code) }
}

fn fork() -> io::Result<Forked> {
    // SAFETY: the child only runs `run_replica`, which touches the inherited
    // listener, allocates and logs, then calls `_exit`.
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => Ok(Forked::Child),
        pid => Ok(Forked::Parent(pid)),
    }
}

fn wait_for(pid: pid_t) -> io::Result<ReplicaStatus> {
    let mut status: libc::c_int = 0;

    loop {
        // SAFETY: `status` is a valid, writable c_int for the duration of the call.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc != -1 {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }

    Ok(decode_status(status))
}

fn decode_status(status: libc::c_int) -> ReplicaStatus {
    if libc::WIFSIGNALED(status) {
        ReplicaStatus::Signaled(libc::WTERMSIG(status))
    } else {
        ReplicaStatus::Exited(libc::WEXITSTATUS(status))
    }
}
