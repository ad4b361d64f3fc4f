//! Time server: answers one connection at a time.

use time_server::Strategy;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    time_server::launch(Strategy::Serial)
}
