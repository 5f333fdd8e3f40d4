//! Stop and restart policy.
//!
//! The PID file is tried first. When it is missing, stale, or its process
//! will not stop, the server's expected ports are scanned and whatever owns
//! them is terminated instead. A port match is taken at face value: there is
//! no further check that the owner really is this server.

use super::{LaunchMode, StartOutcome, Supervisor};
use crate::Result;
use crate::pid_file;
use crate::probe::ProcessTable;
use crate::server::ServerDefinition;
use tokio::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The recorded process tree stopped within its grace period
    Stopped { pid: u32 },
    /// Processes found on the expected ports were terminated. `failed` lists
    /// the ones that needed a forced kill or could not be stopped.
    StoppedPortOwners { stopped: Vec<u32>, failed: Vec<u32> },
    /// No recorded process and nothing listening on the expected ports
    NotRunning,
}

impl<T: ProcessTable> Supervisor<T> {
    pub async fn stop(&self, server: &ServerDefinition) -> StopOutcome {
        let key = &server.key;

        if let Some(pid) = pid_file::read(&server.pid_file) {
            if self.procs.is_alive(pid) {
                println!("[{key}] Stopping PID {pid}...");
                if self.terminate_tree(pid).await {
                    self.remove_pid_file(server);
                    println!("[{key}] Stopped successfully");
                    return StopOutcome::Stopped { pid };
                }
                // keep the pid file if the process survived; it is still the
                // best lead on what is running
                warn!("[{key}] PID {pid} did not stop cleanly, scanning expected ports");
            }
            if !self.procs.is_alive(pid) {
                debug!("[{key}] removing stale pid file for {pid}");
                self.remove_pid_file(server);
            }
        }

        debug!("[{key}] scanning ports {}", server.display_ports());
        let candidates = match self.procs.port_owners(&server.ports) {
            Some(pids) => pids,
            None => {
                debug!("[{key}] socket table unavailable, cannot scan ports");
                Default::default()
            }
        };
        let own_pid = std::process::id();
        let candidates: Vec<u32> = candidates.into_iter().filter(|p| *p != own_pid).collect();
        if candidates.is_empty() {
            println!("[{key}] No running process detected on expected ports");
            return StopOutcome::NotRunning;
        }

        let mut stopped = vec![];
        let mut failed = vec![];
        for pid in candidates {
            println!("[{key}] Terminating process {pid} detected on expected port");
            if self.terminate_tree(pid).await {
                stopped.push(pid);
            } else if self.procs.is_alive(pid) {
                error!("[{key}] failed to stop process {pid}");
                failed.push(pid);
            } else {
                warn!("[{key}] process {pid} had to be killed");
                failed.push(pid);
            }
        }
        StopOutcome::StoppedPortOwners { stopped, failed }
    }

    /// Stops the server, waits for its ports to be released, then starts it.
    ///
    /// Not atomic: if the start fails the server stays down.
    pub async fn restart(
        &self,
        server: &ServerDefinition,
        mode: LaunchMode,
    ) -> Result<StartOutcome> {
        let stopped = self.stop(server).await;
        debug!("[{}] restart: stop finished with {stopped:?}", server.key);
        time::sleep(self.settings.restart_settle).await;
        self.start(server, mode).await
    }

    fn remove_pid_file(&self, server: &ServerDefinition) {
        if let Err(e) = pid_file::remove(&server.pid_file) {
            warn!(
                "[{}] could not remove pid file {}: {e}",
                server.key,
                server.pid_file.display()
            );
        }
    }
}
