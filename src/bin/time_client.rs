//! Time client: connects, prints every line until the server hangs up.

use clap::Parser;
use time_server::client::{self, ClientArgs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    time_server::init_logging(&args.log_level);

    client::run(&args)?;
    Ok(())
}
