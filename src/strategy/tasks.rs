//! Task per connection on a multi-threaded Tokio runtime.

use std::io;
use std::net::TcpListener as StdListener;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::debug;

use crate::greeting::Greeting;
use crate::Error;

/// Build a runtime and serve `listener` on it.
pub fn serve(listener: StdListener, limit: Option<usize>) -> Result<usize, Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("time-task")
        .build()
        .map_err(Error::Runtime)?;

    runtime.block_on(serve_async(listener, limit))
}

/// Accept loop for an already running runtime.
///
/// With a limit, waits for every spawned task before returning.
pub async fn serve_async(listener: StdListener, limit: Option<usize>) -> Result<usize, Error> {
    listener.set_nonblocking(true).map_err(Error::Runtime)?;
    let listener = TcpListener::from_std(listener).map_err(Error::Runtime)?;

    let mut tasks = JoinSet::new();
    let mut accepted = 0;

    while limit.map_or(true, |max| accepted < max) {
        let (stream, peer) = listener.accept().await.map_err(Error::Accept)?;
        accepted += 1;
        debug!(peer = %peer, accepted, "New connection");

        tasks.spawn(async move {
            if let Err(e) = respond(stream).await {
                debug!(peer = %peer, error = %e, "Connection error");
            }
        });

        // Reap finished tasks so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}

    Ok(accepted)
}

async fn respond(mut stream: TcpStream) -> io::Result<()> {
    let greeting = Greeting::now(None);
    stream.write_all(&greeting.encode()).await?;
    stream.shutdown().await?;

    debug!(line = %greeting, "Responded");
    Ok(())
}
