//! Time server: spawns a thread per connection.

use time_server::Strategy;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    time_server::launch(Strategy::Threaded)
}
