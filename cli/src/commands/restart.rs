//! `berth restart`: restart an agent and wait for it to be active again.

use anyhow::Result;
use berth_common::AgentRuntimeState;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::Transition;

/// Run `berth restart`.
///
/// # Errors
///
/// Returns an error if the host cannot be reached or the agent does not
/// come back up.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let controller = app.controller()?;
    let registry = app.registry().await?;
    let user_id = registry.user_of(&args.agent_id);

    app.renderer()
        .progress(&format!("Restarting agent {}...", args.agent_id));
    controller
        .restart(&args.agent_id, user_id.as_deref())
        .await?;
    let address = controller
        .identity(&args.agent_id)
        .await?
        .external_address(&controller.settings().public_host);

    app.renderer().render_transition(&Transition {
        agent_id: &args.agent_id,
        state: AgentRuntimeState::Active,
        address: Some(&address),
        untracked: None,
    })
}
