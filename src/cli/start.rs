use super::{Context, launch_mode};
use crate::Result;
use crate::servman_toml::ALL_TARGETS;

/// Starts one server, or every configured server
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "s",
    verbatim_doc_comment,
    long_about = "\
Starts one server, or every configured server

A server whose recorded PID is still alive is left alone. Without
--background a single server runs in the foreground and its output is
shown here as well as written to its log file. Starting several servers
always runs them in the background.

Examples:
  servman start backend                Run backend in the foreground
  servman start backend --background   Detach backend and return
  servman start                        Start every server in the background"
)]
pub struct Start {
    /// Server from config.toml, or 'both' for all of them
    #[clap(default_value = ALL_TARGETS)]
    pub(crate) target: String,
    /// Run servers detached, writing output only to their log files
    #[clap(long, short)]
    pub(crate) background: bool,
}

impl Start {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let servers = ctx.config.resolve_targets(&self.target)?;
        let mode = launch_mode(self.background, servers.len());

        for server in &servers {
            if let Err(e) = ctx.supervisor.start(server, mode).await {
                error!("{e:?}");
            }
            if servers.len() > 1 {
                println!();
            }
        }

        if servers.len() > 1 && mode.is_background() {
            println!(
                "All selected servers started in background. Use 'servman status' to monitor."
            );
        }
        Ok(())
    }
}
