//! Time server: spawns a Tokio task per connection.

use time_server::Strategy;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    time_server::launch(Strategy::Tasks)
}
