use super::Context;
use crate::Result;
use crate::servman_toml::ALL_TARGETS;
use crate::supervisor::DEFAULT_TAIL;

/// Display the status of one server, or every configured server
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "stat",
    verbatim_doc_comment,
    long_about = "\
Display the status of one server, or every configured server

Shows whether the recorded process is running (with its CPU and memory
use), which expected ports have a listener, and the end of the log.

Example:
  servman status backend --tail 3

Output:
  === BACKEND ===
  ✓ Running (PID 12345)
    CPU: 0.3%  RAM: 41.2 MiB
    Ports in use: 8080
    Last 3 log lines from backend.log:
      ..."
)]
pub struct Status {
    /// Server from config.toml, or 'both' for all of them
    #[clap(default_value = ALL_TARGETS)]
    pub(crate) target: String,
    /// Number of log lines to show
    #[clap(long, default_value_t = DEFAULT_TAIL)]
    pub(crate) tail: usize,
}

impl Status {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        for server in ctx.config.resolve_targets(&self.target)? {
            let status = ctx.supervisor.status(server, self.tail).await;
            println!("{status}");
        }
        Ok(())
    }
}
