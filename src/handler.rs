//! Per-connection handling shared by every strategy.
//!
//! The client is never read from: one line goes out, then the connection is
//! shut down.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use tracing::debug;

use crate::greeting::{Greeting, ServerId};

/// Write `greeting` to `writer` and flush it.
pub fn write_greeting<W: Write>(writer: &mut W, greeting: &Greeting) -> io::Result<()> {
    writer.write_all(&greeting.encode())?;
    writer.flush()
}

/// Answer one accepted connection and close it.
///
/// The socket is shut down explicitly so the peer sees EOF even when another
/// process still holds a copy of the descriptor.
pub fn serve(mut stream: TcpStream, server_id: Option<ServerId>) -> io::Result<()> {
    let greeting = Greeting::now(server_id);
    write_greeting(&mut stream, &greeting)?;

    match stream.shutdown(Shutdown::Both) {
        Err(e) if e.kind() != io::ErrorKind::NotConnected => return Err(e),
        _ => {}
    }

    debug!(line = %greeting, "Responded");
    Ok(())
}
