//! End-to-end run of the forking server.
//!
//! Kept as the only test in this binary: forking copies every descriptor the
//! test process holds, which would disturb tests running on other threads.

#![cfg(unix)]

use std::collections::BTreeSet;
use std::thread;
#[cfg(target_os = "linux")]
use std::time::{Duration, Instant};

use time_server::client::fetch_lines;
use time_server::greeting::{Greeting, ServerId};
use time_server::strategy::process;

const REPLICAS: usize = 2;
const PER_REPLICA: usize = 2;

fn fetch_id(addr: std::net::SocketAddr) -> ServerId {
    let lines = fetch_lines(addr).unwrap();
    assert_eq!(lines.len(), 1, "expected exactly one line, got {lines:?}");
    Greeting::parse(&lines[0])
        .unwrap()
        .server_id
        .expect("forking server tags every line with its id")
}

#[cfg(target_os = "linux")]
fn wait_for_holders(port: u16, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let pids: BTreeSet<u32> = time_server::probe::port_holders(port)
            .unwrap()
            .into_iter()
            .map(|h| h.pid)
            .collect();
        if pids.len() == expected || Instant::now() > deadline {
            return pids.len();
        }
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_forking_server_shares_one_socket() {
    let listener = time_server::listener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server =
        thread::spawn(move || process::serve(&listener, REPLICAS, Some(PER_REPLICA)).unwrap());

    // The parent answers the first connection before replicating.
    assert_eq!(fetch_id(addr), ServerId::PARENT);

    // Parent plus two replicas, all holding the same listening socket.
    #[cfg(target_os = "linux")]
    assert_eq!(wait_for_holders(addr.port(), REPLICAS + 1), REPLICAS + 1);

    let known: BTreeSet<ServerId> = (0..=REPLICAS).map(ServerId).collect();
    for _ in 0..REPLICAS * PER_REPLICA {
        let id = fetch_id(addr);
        assert!(known.contains(&id), "unknown server id {id}");
        assert!(!id.is_parent(), "parent only answers before forking");
    }

    let report = server.join().unwrap();
    assert_eq!(report.replicas.len(), REPLICAS);
    assert_eq!(report.failed().count(), 0);

    let ids: BTreeSet<ServerId> = report.replicas.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=REPLICAS).map(ServerId).collect());
}
