//! Single control flow: the next accept only happens after the previous
//! client has been answered and disconnected.

use std::net::TcpListener;
use tracing::debug;

use super::accept_loop;
use crate::handler;
use crate::Error;

/// Accept and answer connections one at a time.
pub fn serve(listener: &TcpListener, limit: Option<usize>) -> Result<usize, Error> {
    accept_loop(listener, limit, |stream, peer| {
        if let Err(e) = handler::serve(stream, None) {
            debug!(peer = %peer, error = %e, "Connection error");
        }
    })
    .map_err(Error::Accept)
}
