//! `berth logs`: recent runtime output of one agent.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::lifecycle::DEFAULT_LOG_TAIL_LINES;

/// Arguments for the logs command.
#[derive(Args)]
pub struct LogsArgs {
    /// Agent id
    pub agent_id: String,

    /// Number of lines to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_TAIL_LINES)]
    pub lines: u32,
}

/// Run `berth logs`.
///
/// # Errors
///
/// Returns an error if the host cannot be reached or the log query fails.
pub async fn run(app: &AppContext, args: &LogsArgs) -> Result<()> {
    let controller = app.controller()?;
    let logs = controller.get_logs(&args.agent_id, args.lines).await?;

    app.renderer().render_logs(&args.agent_id, &logs)
}
