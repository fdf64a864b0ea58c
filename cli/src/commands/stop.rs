//! `berth stop`: stop an agent, keeping its files and port.

use anyhow::Result;
use berth_common::AgentRuntimeState;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::Transition;

/// Run `berth stop`. The agent is no longer monitored afterwards.
///
/// # Errors
///
/// Returns an error if the host cannot be reached.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let controller = app.controller()?;
    let registry = app.registry().await?;
    let user_id = registry.user_of(&args.agent_id);

    controller.stop(&args.agent_id, user_id.as_deref()).await?;
    let untracked = registry.untrack(&args.agent_id).await?;

    app.renderer().render_transition(&Transition {
        agent_id: &args.agent_id,
        state: AgentRuntimeState::Stopped,
        address: None,
        untracked: Some(untracked),
    })
}
