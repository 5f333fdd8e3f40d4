#[macro_use]
extern crate log;

pub mod cli;
pub mod env;
pub mod error;
pub mod logger;
pub mod pid_file;
pub mod probe;
pub mod procs;
pub mod server;
pub mod servman_toml;
pub mod settings;
pub mod supervisor;

pub use miette::Result;
