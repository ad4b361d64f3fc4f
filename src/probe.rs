//! Which processes hold a listening socket on a port.
//!
//! The same question `lsof -i :<port>` answers, read straight from procfs:
//! listening sockets come from `/proc/net/tcp{,6}` (state `0A`), and a
//! process holds one when a link under `/proc/<pid>/fd` reads
//! `socket:[<inode>]`. Processes whose descriptors cannot be read (other
//! users, exited mid-scan) are skipped.
//!
//! Only available on Linux.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TCP_LISTEN: u8 = 0x0A;
const PROC_NET_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];

/// One process holding one listening socket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortHolder {
    pub pid: u32,
    pub command: String,
    pub inode: u64,
}

/// A row of `/proc/net/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketEntry {
    pub local_port: u16,
    pub state: u8,
    pub inode: u64,
}

impl SocketEntry {
    pub fn is_listening(&self) -> bool {
        self.state == TCP_LISTEN
    }
}

#[derive(Debug)]
pub enum ProbeError {
    Unsupported,
    Io(PathBuf, io::Error),
    Parse(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Unsupported => write!(f, "port probing requires Linux procfs"),
            ProbeError::Io(path, e) => write!(f, "Failed to read '{}': {}", path.display(), e),
            ProbeError::Parse(line) => write!(f, "Malformed socket table row: '{line}'"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Every process holding a listening TCP socket on `port`, sorted by pid.
pub fn port_holders(port: u16) -> Result<Vec<PortHolder>, ProbeError> {
    if !cfg!(target_os = "linux") {
        return Err(ProbeError::Unsupported);
    }

    let inodes = listening_inodes(port)?;
    if inodes.is_empty() {
        return Ok(Vec::new());
    }
    scan_processes(Path::new("/proc"), &inodes)
}

/// Inodes of the listening sockets bound to `port`, IPv4 and IPv6.
pub fn listening_inodes(port: u16) -> Result<BTreeSet<u64>, ProbeError> {
    let mut inodes = BTreeSet::new();

    for table in PROC_NET_TABLES {
        let contents = match fs::read_to_string(table) {
            Ok(contents) => contents,
            // tcp6 is absent when IPv6 is disabled.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(ProbeError::Io(PathBuf::from(table), e)),
        };

        for entry in parse_socket_table(&contents)? {
            if entry.is_listening() && entry.local_port == port {
                inodes.insert(entry.inode);
            }
        }
    }

    Ok(inodes)
}

/// Parse the text of a `/proc/net/tcp` style table, header included.
pub fn parse_socket_table(contents: &str) -> Result<Vec<SocketEntry>, ProbeError> {
    contents
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(parse_socket_row)
        .collect()
}

fn parse_socket_row(line: &str) -> Result<SocketEntry, ProbeError> {
    let malformed = || ProbeError::Parse(line.trim().to_string());
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(malformed());
    }

    // local_address is "<hex ip>:<hex port>"
    let (_, port_hex) = fields[1].rsplit_once(':').ok_or_else(malformed)?;
    let local_port = u16::from_str_radix(port_hex, 16).map_err(|_| malformed())?;
    let state = u8::from_str_radix(fields[3], 16).map_err(|_| malformed())?;
    let inode = fields[9].parse().map_err(|_| malformed())?;

    Ok(SocketEntry {
        local_port,
        state,
        inode,
    })
}

/// Extract the inode from a `socket:[<inode>]` fd link target.
pub fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

fn scan_processes(proc_root: &Path, inodes: &BTreeSet<u64>) -> Result<Vec<PortHolder>, ProbeError> {
    let entries =
        fs::read_dir(proc_root).map_err(|e| ProbeError::Io(proc_root.to_path_buf(), e))?;

    let mut holders = Vec::new();
    for entry in entries.flatten() {
        let pid: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        let held: BTreeSet<u64> = fds
            .flatten()
            .filter_map(|fd| fs::read_link(fd.path()).ok())
            .filter_map(|target| target.to_str().and_then(socket_inode))
            .filter(|inode| inodes.contains(inode))
            .collect();

        if held.is_empty() {
            continue;
        }

        let command = fs::read_to_string(entry.path().join("comm"))
            .map(|c| c.trim_end().to_string())
            .unwrap_or_default();

        for inode in held {
            holders.push(PortHolder {
                pid,
                command: command.clone(),
                inode,
            });
        }
    }

    holders.sort();
    Ok(holders)
}
