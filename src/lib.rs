//! time-server: four ways to tell the time over TCP
//!
//! Every server binds one listening socket, writes a single line with the
//! current time to each client and closes the connection. They differ only
//! in how connections are scheduled:
//! - `serial`: one accept loop, one connection at a time
//! - `threaded`: a new OS thread per connection
//! - `process`: the parent answers once, then forks replicas that share the
//!   bound socket and accept on it independently
//! - `tasks`: a Tokio task per connection
//!
//! `client` reads lines until the server hangs up and `probe` lists the
//! processes holding a listening socket, like `lsof -i :<port>`.

pub mod client;
pub mod config;
mod error;
pub mod greeting;
pub mod handler;
pub mod listener;
pub mod probe;
pub mod strategy;

pub use config::Config;
pub use error::Error;
pub use greeting::{Greeting, ServerId};
pub use strategy::Strategy;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize logging on stderr. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point of the server binaries.
pub fn launch(strategy: Strategy) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_logging(&config.log_level);

    info!(
        listen = %config.listen,
        strategy = %strategy,
        replicas = config.replicas,
        accept_limit = ?config.accept_limit,
        "Starting time server"
    );

    let listener = listener::bind(&config.listen)?;
    strategy::run(strategy, listener, &config)?;
    Ok(())
}
