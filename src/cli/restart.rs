use super::{Context, launch_mode};
use crate::Result;
use crate::servman_toml::ALL_TARGETS;

/// Restarts a server (stops then starts it)
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Restarts a server (stops then starts it)

Stops the server exactly like 'servman stop', waits for its ports to be
released, then starts it again. If the start fails the server stays
down; run 'servman start' once the problem is fixed.

Examples:
  servman restart backend                Restart backend in the foreground
  servman restart both --background      Restart every server detached"
)]
pub struct Restart {
    /// Server from config.toml, or 'both' for all of them
    #[clap(default_value = ALL_TARGETS)]
    pub(crate) target: String,
    /// Run servers detached, writing output only to their log files
    #[clap(long, short)]
    pub(crate) background: bool,
}

impl Restart {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let servers = ctx.config.resolve_targets(&self.target)?;
        let mode = launch_mode(self.background, servers.len());

        for server in &servers {
            if let Err(e) = ctx.supervisor.restart(server, mode).await {
                error!("{e:?}");
            }
            if servers.len() > 1 {
                println!();
            }
        }

        if servers.len() > 1 && mode.is_background() {
            println!("All selected servers restarted in background.");
        }
        Ok(())
    }
}
