use crate::servman_toml::ServmanToml;
use crate::supervisor::{LaunchMode, Supervisor};
use crate::{Result, env};
use clap::Parser;
use std::path::PathBuf;

mod restart;
mod start;
mod status;
mod stop;

/// Start, stop, restart and inspect the servers defined in config.toml
#[derive(Debug, clap::Parser)]
#[clap(
    name = "servman",
    version,
    verbatim_doc_comment,
    after_long_help = "\
Examples:
  servman start backend
  servman restart both --background
  servman status frontend --tail 20"
)]
struct Cli {
    /// Path to config.toml (default: <root>/config.toml)
    #[clap(long, global = true, env = "SERVMAN_CONFIG")]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Start(start::Start),
    Stop(stop::Stop),
    Restart(restart::Restart),
    Status(status::Status),
}

/// Everything a command needs: the loaded configuration and a supervisor
/// built from its settings.
pub struct Context {
    pub config: ServmanToml,
    pub supervisor: Supervisor,
}

pub async fn run() -> Result<()> {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // usage errors exit 1; --help and --version exit 0
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config_path = args.config.unwrap_or_else(|| env::SERVMAN_CONFIG.clone());
    let config = ServmanToml::read(&config_path, &env::SERVMAN_ROOT)?;
    debug!("using config {}", config.path.display());
    let ctx = Context {
        supervisor: Supervisor::with_settings(config.settings.clone()),
        config,
    };

    match args.command {
        Command::Start(start) => start.run(&ctx).await,
        Command::Stop(stop) => stop.run(&ctx).await,
        Command::Restart(restart) => restart.run(&ctx).await,
        Command::Status(status) => status.run(&ctx).await,
    }
}

/// Picks the launch mode for a start or restart. Several servers cannot all
/// run in the foreground, so multi-server runs are promoted to background.
pub(crate) fn launch_mode(background: bool, targets: usize) -> LaunchMode {
    if background {
        LaunchMode::Background
    } else if targets > 1 {
        println!(
            "Multiple servers requested; automatically enabling background mode so they can start together."
        );
        LaunchMode::Background
    } else {
        LaunchMode::Foreground
    }
}
