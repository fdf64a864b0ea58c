//! `berth stats`: service state and resource usage of one agent.

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::AgentArgs;

/// Run `berth stats`.
///
/// # Errors
///
/// Returns an error if the host cannot be reached.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let controller = app.controller()?;
    let stats = controller.get_stats(&args.agent_id).await?;

    app.renderer().render_stats(&args.agent_id, stats.as_ref())
}
