//! Process-tree termination.
//!
//! Descendants are always stopped before the root: killing the root first can
//! reparent its children, after which they are no longer found by walking
//! the tree from the root.

use super::Supervisor;
use crate::probe::{ProcessTable, StopSignal};
use std::time::Duration;
use tokio::time::{self, Instant};

impl<T: ProcessTable> Supervisor<T> {
    /// Stops `root` and everything it spawned.
    ///
    /// Returns true only if the root exited within its grace period. Returns
    /// false when the root does not exist, or when it had to be killed.
    pub async fn terminate_tree(&self, root: u32) -> bool {
        if !self.procs.is_alive(root) {
            debug!("terminate: pid {root} is not running");
            return false;
        }

        let children = self.procs.descendants(root);
        if !children.is_empty() {
            debug!("terminate: pid {root} has descendants {children:?}");
            for &child in &children {
                if !self.procs.signal(child, StopSignal::Terminate) {
                    trace!("terminate: child pid {child} already gone");
                }
            }
            let survivors = self
                .wait_for_exit(&children, self.settings.child_grace)
                .await;
            for pid in survivors {
                warn!("child pid {pid} ignored SIGTERM, killing it");
                self.procs.signal(pid, StopSignal::Kill);
            }
        }

        if !self.procs.signal(root, StopSignal::Terminate) {
            // exited on its own once its children were gone
            return !self.procs.is_alive(root);
        }
        if self
            .wait_for_exit(&[root], self.settings.root_grace)
            .await
            .is_empty()
        {
            debug!("terminate: pid {root} exited");
            return true;
        }

        warn!(
            "pid {root} did not exit within {}, killing it",
            humantime::format_duration(self.settings.root_grace)
        );
        self.procs.signal(root, StopSignal::Kill);
        false
    }

    /// Polls until every pid has exited or `budget` runs out. Returns the pids
    /// still alive at the deadline.
    pub(crate) async fn wait_for_exit(&self, pids: &[u32], budget: Duration) -> Vec<u32> {
        let deadline = Instant::now() + budget;
        loop {
            let alive: Vec<u32> = pids
                .iter()
                .copied()
                .filter(|pid| self.procs.is_alive(*pid))
                .collect();
            let now = Instant::now();
            if alive.is_empty() || now >= deadline {
                return alive;
            }
            time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }
}
