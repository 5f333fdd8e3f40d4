//! Process and port probes.
//!
//! OS queries can fail for reasons unrelated to the question asked (most
//! commonly permissions), so every probe answers with three values. Callers
//! collapse `Unknown` to "no" at the point of use, which means a restricted
//! environment produces false negatives rather than errors.

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum Liveness {
    Alive,
    Dead,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum PortState {
    Listening,
    Closed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StopSignal {
    /// Graceful request (SIGTERM)
    #[strum(serialize = "SIGTERM")]
    Terminate,
    /// Forceful kill (SIGKILL)
    #[strum(serialize = "SIGKILL")]
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

impl ResourceUsage {
    pub fn memory_mib(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Everything servman needs to know about, or do to, OS processes.
///
/// [`crate::procs::Procs`] is the real implementation. The terminator,
/// reconciler and status reporter only go through this trait.
pub trait ProcessTable {
    fn liveness(&self, pid: u32) -> Liveness;

    /// All transitive descendants of `pid`, not including `pid` itself.
    fn descendants(&self, pid: u32) -> Vec<u32>;

    /// Returns false if the process could not be signalled (usually because it
    /// no longer exists).
    fn signal(&self, pid: u32, signal: StopSignal) -> bool;

    /// PIDs owning a listening socket on any of `ports`. `None` when the
    /// socket table cannot be read.
    fn port_owners(&self, ports: &[u16]) -> Option<BTreeSet<u32>>;

    /// Listening state of each port, in the order given.
    fn port_states(&self, ports: &[u16], connect_timeout: Duration) -> Vec<PortState>;

    /// Takes the first CPU sample for `pid`; [`ProcessTable::usage`] takes the
    /// second one.
    fn begin_usage_sample(&self, pid: u32);

    fn usage(&self, pid: u32) -> Option<ResourceUsage>;

    fn is_alive(&self, pid: u32) -> bool {
        pid > 0 && self.liveness(pid).is_alive()
    }
}

/// Attempts a TCP connection to the loopback interface.
pub fn connect_probe(port: u16, timeout: Duration) -> PortState {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(_) => PortState::Listening,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => PortState::Closed,
        Err(e) => {
            trace!("connect probe on port {port} failed: {e}");
            PortState::Unknown
        }
    }
}
