//! Supervisor module - server lifecycle engine
//!
//! This module is split into focused submodules:
//! - `lifecycle`: starting servers in the foreground or background
//! - `terminate`: stopping a process tree with escalating signals
//! - `reconcile`: stop/restart policy with the port-scan fallback
//! - `status`: per-server status snapshots and log tailing
//!
//! Every action runs to completion before the next one starts. The only
//! concurrency is at the OS level, where background servers outlive servman.

mod lifecycle;
mod reconcile;
mod status;
mod terminate;

use crate::probe::ProcessTable;
use crate::procs::Procs;
use crate::settings::Settings;

pub use lifecycle::{LaunchMode, LogMode, StartOutcome, prepare_log_file};
pub use reconcile::StopOutcome;
pub use status::{DEFAULT_TAIL, ServerStatus, tail_log};

pub struct Supervisor<T: ProcessTable = Procs> {
    pub(crate) procs: T,
    pub(crate) settings: Settings,
}

impl Supervisor<Procs> {
    pub fn with_settings(settings: Settings) -> Self {
        Self::new(Procs::new(), settings)
    }
}

impl<T: ProcessTable> Supervisor<T> {
    pub fn new(procs: T, settings: Settings) -> Self {
        Self { procs, settings }
    }

    pub fn procs(&self) -> &T {
        &self.procs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
