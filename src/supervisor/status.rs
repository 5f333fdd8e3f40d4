//! Status snapshots: liveness of the recorded PID, resource usage, expected
//! ports and the tail of the log, rendered as a text block per server.

use super::Supervisor;
use crate::pid_file;
use crate::probe::{ProcessTable, ResourceUsage};
use crate::server::ServerDefinition;
use itertools::Itertools;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::time;

pub const DEFAULT_TAIL: usize = 10;

#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub key: String,
    /// Recorded PID, only set when that process is alive
    pub running_pid: Option<u32>,
    pub usage: Option<ResourceUsage>,
    pub expected_ports: Vec<u16>,
    pub listening_ports: Vec<u16>,
    pub log_file: PathBuf,
    pub log_lines: Vec<String>,
    pub tail: usize,
}

impl<T: ProcessTable> Supervisor<T> {
    pub async fn status(&self, server: &ServerDefinition, tail: usize) -> ServerStatus {
        let running_pid = pid_file::read(&server.pid_file).filter(|pid| self.procs.is_alive(*pid));

        let usage = match running_pid {
            Some(pid) => {
                self.procs.begin_usage_sample(pid);
                time::sleep(self.settings.cpu_sample_window()).await;
                self.procs.usage(pid)
            }
            None => None,
        };

        let listening_ports = server
            .ports
            .iter()
            .zip(
                self.procs
                    .port_states(&server.ports, self.settings.connect_timeout),
            )
            .filter(|(_, state)| state.is_listening())
            .map(|(port, _)| *port)
            .collect();

        ServerStatus {
            key: server.key.clone(),
            running_pid,
            usage,
            expected_ports: server.ports.clone(),
            listening_ports,
            log_file: server.log_file.clone(),
            log_lines: tail_log(&server.log_file, tail),
            tail,
        }
    }
}

/// Returns the last `lines` lines of the log, oldest first. A missing or
/// unreadable log yields no lines; invalid UTF-8 is replaced with U+FFFD.
pub fn tail_log(path: &Path, lines: usize) -> Vec<String> {
    if lines == 0 {
        return vec![];
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            trace!("cannot read log {}: {e}", path.display());
            return vec![];
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let all = content.lines().collect_vec();
    all[all.len().saturating_sub(lines)..]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

impl Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== {} ===", self.key.to_uppercase())?;
        match self.running_pid {
            Some(pid) => {
                writeln!(f, "{}", console::style(format!("✓ Running (PID {pid})")).green())?;
                if let Some(usage) = &self.usage {
                    writeln!(
                        f,
                        "  CPU: {:.1}%  RAM: {:.1} MiB",
                        usage.cpu_percent,
                        usage.memory_mib()
                    )?;
                }
            }
            None => writeln!(f, "{}", console::style("✗ Not running").red())?,
        }

        if self.listening_ports.is_empty() {
            writeln!(
                f,
                "  No expected ports ({}) are listening",
                self.expected_ports.iter().join(", ")
            )?;
        } else {
            writeln!(f, "  Ports in use: {}", self.listening_ports.iter().join(", "))?;
        }

        if self.log_lines.is_empty() {
            writeln!(f, "  No log file at {}", self.log_file.display())?;
        } else {
            let name = self
                .log_file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            writeln!(
                f,
                "  Last {} log lines from {name}:",
                self.tail.min(self.log_lines.len())
            )?;
            for line in &self.log_lines {
                writeln!(f, "    {}", line.trim_end())?;
            }
        }
        Ok(())
    }
}
