//! Listening socket construction.
//!
//! `SO_REUSEADDR` is set so a restarted server is not blocked by sockets in
//! `TIME_WAIT`. `SO_REUSEPORT` stays off: a second bind on a port in use
//! fails, and several processes can only accept on one port by inheriting
//! the same bound socket.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::info;

use crate::Error;

const BACKLOG: i32 = 1024;

/// Resolve `addr` and bind a blocking listener to it.
pub fn bind(addr: &str) -> Result<TcpListener, Error> {
    let resolved = resolve(addr).map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })?;

    let listener = bind_addr(resolved).map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })?;

    info!(addr = %resolved, "Listening");
    Ok(listener)
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{addr}' did not resolve to any address"),
        )
    })
}

fn bind_addr(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpStream;

    #[test]
    fn test_bind_ephemeral() {
        let listener = bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut accepted, _) = listener.accept().unwrap();
        std::io::Write::write_all(&mut accepted, b"x").unwrap();
        let mut byte = [0u8; 1];
        client.read_exact(&mut byte).unwrap();
        assert_eq!(&byte, b"x");
    }

    #[test]
    fn test_second_bind_is_addr_in_use() {
        let first = bind("127.0.0.1:0").unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = bind(&addr).unwrap_err();
        assert!(err.is_addr_in_use(), "unexpected error: {err}");
    }

    #[test]
    fn test_unresolvable_address() {
        let err = bind("not an address").unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
        assert!(!err.is_addr_in_use());
    }
}
