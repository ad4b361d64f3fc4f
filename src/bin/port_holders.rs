//! Lists the processes holding a listening socket on a port, `lsof` style.

use clap::Parser;
use time_server::config::DEFAULT_PORT;
use time_server::probe;

#[derive(Parser, Debug)]
#[command(name = "port-holders")]
#[command(version = "0.1.0")]
#[command(about = "List processes listening on a TCP port", long_about = None)]
struct Args {
    /// TCP port to inspect
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let holders = probe::port_holders(args.port)?;

    println!("{:<16} {:>8} {:>12}", "COMMAND", "PID", "INODE");
    for holder in &holders {
        println!("{:<16} {:>8} {:>12}", holder.command, holder.pid, holder.inode);
    }

    if holders.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
