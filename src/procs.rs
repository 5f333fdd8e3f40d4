use crate::probe::{self, Liveness, PortState, ProcessTable, ResourceUsage, StopSignal};
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate};

/// [`ProcessTable`] backed by sysinfo, with the kernel consulted directly for
/// liveness on unix and the `listeners` crate for socket ownership.
pub struct Procs {
    system: Mutex<sysinfo::System>,
}

impl Default for Procs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procs {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, sysinfo::System> {
        self.system.lock().unwrap_or_else(|poisoned| {
            warn!("System mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn all_children(&self, pid: u32) -> Vec<u32> {
        self.refresh_processes();
        let system = self.lock_system();
        let root = sysinfo::Pid::from_u32(pid);
        let mut children = vec![];
        for (child_pid, process) in system.processes() {
            // on linux threads are listed with their process as parent
            if *child_pid == root || process.thread_kind().is_some() {
                continue;
            }
            let mut process = process;
            let mut seen = HashSet::new();
            while let Some(parent) = process.parent() {
                if parent == root {
                    children.push(child_pid.as_u32());
                    break;
                }
                if !seen.insert(parent) {
                    break;
                }
                match system.process(parent) {
                    Some(p) => process = p,
                    None => break,
                }
            }
        }
        children.sort_unstable();
        children
    }

    pub(crate) fn refresh_processes(&self) {
        self.lock_system()
            .refresh_processes(ProcessesToUpdate::All, true);
    }

    pub(crate) fn refresh_pids(&self, pids: &[u32]) {
        let pids = pids
            .iter()
            .map(|p| sysinfo::Pid::from_u32(*p))
            .collect::<Vec<_>>();
        self.lock_system()
            .refresh_processes(ProcessesToUpdate::Some(&pids), true);
    }

    fn refresh_usage(&self, pid: u32) {
        let pid = sysinfo::Pid::from_u32(pid);
        self.lock_system().refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
    }
}

/// Asks the kernel whether `pid` exists without sending a signal.
#[cfg(unix)]
fn kernel_liveness(pid: u32) -> Liveness {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return Liveness::Dead;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => Liveness::Alive,
        // exists, but belongs to someone else
        Err(Errno::EPERM) => Liveness::Alive,
        Err(Errno::ESRCH) => Liveness::Dead,
        Err(e) => {
            debug!("liveness probe for pid {pid} failed: {e}");
            Liveness::Unknown
        }
    }
}

/// Listening TCP sockets. UDP entries are bound but never listening.
fn tcp_listeners() -> Option<Vec<listeners::Listener>> {
    match listeners::get_all() {
        Ok(all) => Some(
            all.into_iter()
                .filter(|l| l.protocol == listeners::Protocol::TCP)
                .collect(),
        ),
        Err(e) => {
            debug!("could not read socket table: {e}");
            None
        }
    }
}

#[cfg(not(unix))]
fn kernel_liveness(_pid: u32) -> Liveness {
    Liveness::Unknown
}

impl ProcessTable for Procs {
    fn liveness(&self, pid: u32) -> Liveness {
        if pid == 0 {
            return Liveness::Dead;
        }
        let kernel = kernel_liveness(pid);
        if kernel.is_dead() {
            return Liveness::Dead;
        }
        self.refresh_pids(&[pid]);
        match self.lock_system().process(sysinfo::Pid::from_u32(pid)) {
            // an unreaped child still answers kill(0) but is gone for our purposes
            Some(p) if matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead) => {
                Liveness::Dead
            }
            Some(_) => Liveness::Alive,
            None if cfg!(unix) => kernel,
            None => Liveness::Dead,
        }
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        self.all_children(pid)
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> bool {
        self.refresh_pids(&[pid]);
        let system = self.lock_system();
        let Some(process) = system.process(sysinfo::Pid::from_u32(pid)) else {
            return false;
        };
        debug!("sending {signal} to pid {pid}");
        match signal {
            StopSignal::Terminate => process
                .kill_with(sysinfo::Signal::Term)
                .unwrap_or_else(|| process.kill()),
            StopSignal::Kill => process.kill(),
        }
    }

    fn port_owners(&self, ports: &[u16]) -> Option<BTreeSet<u32>> {
        let listeners = tcp_listeners()?;
        Some(
            listeners
                .into_iter()
                .filter(|l| ports.contains(&l.socket.port()))
                .map(|l| l.process.pid)
                .filter(|pid| *pid > 0)
                .collect(),
        )
    }

    fn port_states(&self, ports: &[u16], connect_timeout: Duration) -> Vec<PortState> {
        let table: Option<HashSet<u16>> =
            tcp_listeners().map(|all| all.into_iter().map(|l| l.socket.port()).collect());
        ports
            .iter()
            .map(|port| match &table {
                Some(listening) if listening.contains(port) => PortState::Listening,
                // the table only shows sockets we may inspect, so confirm misses
                Some(_) => match probe::connect_probe(*port, connect_timeout) {
                    PortState::Listening => PortState::Listening,
                    _ => PortState::Closed,
                },
                None => probe::connect_probe(*port, connect_timeout),
            })
            .collect()
    }

    fn begin_usage_sample(&self, pid: u32) {
        self.refresh_usage(pid);
    }

    fn usage(&self, pid: u32) -> Option<ResourceUsage> {
        self.refresh_usage(pid);
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .map(|p| ResourceUsage {
                cpu_percent: p.cpu_usage(),
                memory_bytes: p.memory(),
            })
    }
}
