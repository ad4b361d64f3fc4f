//! Client side: connect, read lines until the server hangs up.

use clap::Parser;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

use crate::config::DEFAULT_PORT;
use crate::greeting::Greeting;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "time-client")]
#[command(version = "0.1.0")]
#[command(about = "Ask a time server for the time", long_about = None)]
pub struct ClientArgs {
    /// Server address
    #[arg(short, long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    pub server: String,

    /// Number of connections to make, one after another
    #[arg(short = 'n', long, default_value_t = 1)]
    pub repeat: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Connect once and collect every line until EOF.
///
/// Lines are returned without their terminators.
pub fn fetch_lines<A: ToSocketAddrs>(addr: A) -> io::Result<Vec<String>> {
    let stream = TcpStream::connect(addr)?;
    debug!(peer = %stream.peer_addr()?, "Connected");
    read_lines(stream)
}

/// Read `reader` to EOF, one line at a time.
pub fn read_lines<R: io::Read>(reader: R) -> io::Result<Vec<String>> {
    BufReader::new(reader).lines().collect()
}

/// Connect `repeat` times and print every received line to stdout.
pub fn run(args: &ClientArgs) -> io::Result<()> {
    let stdout = io::stdout();
    run_to(args, &mut stdout.lock())
}

/// Connect `repeat` times and write every received line to `out`.
///
/// Lines that are not time greetings are still written; the warning about
/// them goes to the log, never to `out`.
pub fn run_to<W: Write>(args: &ClientArgs, out: &mut W) -> io::Result<()> {
    for _ in 0..args.repeat {
        for line in fetch_lines(args.server.as_str())? {
            if let Err(e) = Greeting::parse(&line) {
                warn!(line = %line, error = %e, "Unexpected line from server");
            }
            writeln!(out, "{line}")?;
        }
    }
    out.flush()
}
