use super::Context;
use crate::Result;
use crate::servman_toml::ALL_TARGETS;

/// Stops one server, or every configured server
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "kill",
    verbatim_doc_comment,
    long_about = "\
Stops one server, or every configured server

Sends SIGTERM to the recorded process and everything it spawned, and
SIGKILL to anything still running after the grace period. If no live
process is recorded, whatever listens on the server's expected ports is
stopped instead.

Examples:
  servman stop backend    Stop a single server
  servman stop            Stop every server"
)]
pub struct Stop {
    /// Server from config.toml, or 'both' for all of them
    #[clap(default_value = ALL_TARGETS)]
    pub(crate) target: String,
}

impl Stop {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let servers = ctx.config.resolve_targets(&self.target)?;
        for server in &servers {
            let outcome = ctx.supervisor.stop(server).await;
            trace!("stop {server}: {outcome:?}");
            if servers.len() > 1 {
                println!();
            }
        }
        Ok(())
    }
}
