//! Thread per connection.
//!
//! There is no pool and no cap on live threads: every accepted connection
//! gets a new OS thread and the accept loop moves on immediately.

use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::accept_loop;
use crate::handler;
use crate::Error;

/// Accept connections, handing each one to a newly spawned thread.
///
/// With a limit, waits for every handler thread before returning.
pub fn serve(listener: &TcpListener, limit: Option<usize>) -> Result<usize, Error> {
    let mut handlers: Vec<JoinHandle<()>> = Vec::new();
    let mut next_id: u64 = 0;

    let accepted = accept_loop(listener, limit, |stream, peer| {
        // Finished handles are dropped so the list tracks live threads only.
        handlers.retain(|h| !h.is_finished());

        let spawned = thread::Builder::new()
            .name(format!("conn-{next_id}"))
            .spawn(move || {
                if let Err(e) = handler::serve(stream, None) {
                    debug!(peer = %peer, error = %e, "Connection error");
                }
            });
        next_id += 1;

        match spawned {
            Ok(handle) => handlers.push(handle),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to spawn handler thread"),
        }
    })
    .map_err(Error::Accept)?;

    for handle in handlers {
        let name = handle.thread().name().unwrap_or("conn").to_string();
        if handle.join().is_err() {
            warn!(thread = %name, "Handler thread panicked");
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::Greeting;
    use std::io::Read;
    use std::net::TcpStream;

    #[test]
    fn test_threaded_answers_concurrent_clients() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || serve(&listener, Some(8)));

        let clients: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(move || {
                    let mut stream = TcpStream::connect(addr).unwrap();
                    let mut received = String::new();
                    stream.read_to_string(&mut received).unwrap();
                    received
                })
            })
            .collect();

        for client in clients {
            let line = client.join().unwrap();
            assert_eq!(line.lines().count(), 1);
            assert_eq!(Greeting::parse(&line).unwrap().server_id, None);
        }
        assert_eq!(server.join().unwrap().unwrap(), 8);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_threaded_server_is_the_only_holder() {
        let listener = crate::listener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || serve(&listener, Some(2)));

        // Answered once, so the server is running and its handler threads exist.
        let mut first = TcpStream::connect(addr).unwrap();
        let mut received = String::new();
        first.read_to_string(&mut received).unwrap();

        let holders = crate::probe::port_holders(addr.port()).unwrap();
        assert_eq!(holders.len(), 1, "{holders:?}");
        assert_eq!(holders[0].pid, std::process::id());

        let mut second = TcpStream::connect(addr).unwrap();
        second.read_to_string(&mut received).unwrap();
        assert_eq!(server.join().unwrap().unwrap(), 2);
    }

    #[test]
    fn test_threaded_keeps_accepting_while_client_idles() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || serve(&listener, Some(2)));

        // First client never reads; the second must still be answered.
        let _idle = TcpStream::connect(addr).unwrap();
        let mut second = TcpStream::connect(addr).unwrap();
        let mut received = String::new();
        second.read_to_string(&mut received).unwrap();
        assert!(Greeting::parse(&received).is_ok());

        assert_eq!(server.join().unwrap().unwrap(), 2);
    }
}
