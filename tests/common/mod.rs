#![allow(dead_code)]

use servman::probe::{Liveness, PortState, ProcessTable, ResourceUsage, StopSignal};
use servman::server::ServerDefinition;
use servman::settings::Settings;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Settings with every wait shrunk so tests finish quickly.
pub fn fast_settings() -> Settings {
    Settings {
        start_check_delay: Duration::from_millis(300),
        restart_settle: Duration::from_millis(10),
        child_grace: Duration::from_millis(300),
        root_grace: Duration::from_millis(500),
        connect_timeout: Duration::from_millis(100),
        cpu_sample: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
    }
}

/// A server whose log and pid files live under `dir`, running in `dir`.
pub fn server_def(dir: &Path, key: &str, command: &[&str], ports: &[u16]) -> ServerDefinition {
    ServerDefinition {
        key: key.to_string(),
        directory: dir.to_path_buf(),
        command: command.iter().map(|s| s.to_string()).collect(),
        executable: command[0].to_string(),
        log_file: dir.join("logs").join(format!("{key}.log")),
        pid_file: dir.join("run").join(format!("{key}.pid")),
        ports: ports.to_vec(),
    }
}

pub fn write_pid(server: &ServerDefinition, pid: u32) {
    servman::pid_file::write(&server.pid_file, pid).unwrap();
}

#[derive(Default)]
struct FakeState {
    alive: BTreeSet<u32>,
    children: HashMap<u32, Vec<u32>>,
    port_owners: BTreeMap<u16, u32>,
    /// pids that ignore SIGTERM
    stubborn: BTreeSet<u32>,
    table_unavailable: bool,
    signals: Vec<(u32, StopSignal)>,
}

/// In-memory process table. Signals are recorded and applied instantly:
/// SIGTERM kills anything not marked stubborn, SIGKILL kills everything.
#[derive(Default)]
pub struct FakeProcs {
    state: Mutex<FakeState>,
}

impl FakeProcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn spawn(&self, pid: u32) -> &Self {
        self.with_state(|s| {
            s.alive.insert(pid);
        });
        self
    }

    pub fn spawn_child(&self, parent: u32, child: u32) -> &Self {
        self.with_state(|s| {
            s.alive.insert(child);
            s.children.entry(parent).or_default().push(child);
        });
        self
    }

    pub fn listen(&self, pid: u32, port: u16) -> &Self {
        self.with_state(|s| {
            s.alive.insert(pid);
            s.port_owners.insert(port, pid);
        });
        self
    }

    pub fn ignore_sigterm(&self, pid: u32) -> &Self {
        self.with_state(|s| {
            s.stubborn.insert(pid);
        });
        self
    }

    pub fn hide_socket_table(&self) -> &Self {
        self.with_state(|s| s.table_unavailable = true);
        self
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.state.lock().unwrap().signals.clone()
    }

    pub fn signalled_pids(&self) -> Vec<u32> {
        self.signals().into_iter().map(|(pid, _)| pid).collect()
    }
}

impl ProcessTable for FakeProcs {
    fn liveness(&self, pid: u32) -> Liveness {
        if self.state.lock().unwrap().alive.contains(&pid) {
            Liveness::Alive
        } else {
            Liveness::Dead
        }
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let mut out = vec![];
        let mut queue = vec![pid];
        while let Some(parent) = queue.pop() {
            for child in state.children.get(&parent).into_iter().flatten() {
                if state.alive.contains(child) && !out.contains(child) {
                    out.push(*child);
                    queue.push(*child);
                }
            }
        }
        out.sort_unstable();
        out
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.alive.contains(&pid) {
            return false;
        }
        state.signals.push((pid, signal));
        if signal == StopSignal::Kill || !state.stubborn.contains(&pid) {
            state.alive.remove(&pid);
        }
        true
    }

    fn port_owners(&self, ports: &[u16]) -> Option<BTreeSet<u32>> {
        let state = self.state.lock().unwrap();
        if state.table_unavailable {
            return None;
        }
        Some(
            ports
                .iter()
                .filter_map(|port| state.port_owners.get(port))
                .filter(|pid| state.alive.contains(pid))
                .copied()
                .collect(),
        )
    }

    fn port_states(&self, ports: &[u16], _connect_timeout: Duration) -> Vec<PortState> {
        let state = self.state.lock().unwrap();
        ports
            .iter()
            .map(|port| match state.port_owners.get(port) {
                Some(pid) if state.alive.contains(pid) => PortState::Listening,
                _ => PortState::Closed,
            })
            .collect()
    }

    fn begin_usage_sample(&self, _pid: u32) {}

    fn usage(&self, pid: u32) -> Option<ResourceUsage> {
        self.is_alive(pid).then_some(ResourceUsage {
            cpu_percent: 2.0,
            memory_bytes: 10 * 1024 * 1024,
        })
    }
}
