//! `berth delete`: remove an agent from the host.

use anyhow::Result;
use berth_common::AgentRuntimeState;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::Transition;

/// Run `berth delete`. Deleting an agent that is already gone succeeds.
///
/// # Errors
///
/// Returns an error if the host cannot be reached or a removal step fails.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let controller = app.controller()?;
    let registry = app.registry().await?;
    let user_id = registry.user_of(&args.agent_id);

    controller
        .delete(&args.agent_id, user_id.as_deref())
        .await?;
    let untracked = registry.untrack(&args.agent_id).await?;

    app.renderer().render_transition(&Transition {
        agent_id: &args.agent_id,
        state: AgentRuntimeState::Deleted,
        address: None,
        untracked: Some(untracked),
    })
}
