//! Time server: answers once, then forks replicas (two by default) that share the listening socket.

use time_server::Strategy;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    time_server::launch(Strategy::Process)
}
