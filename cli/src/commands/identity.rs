//! `berth identity`: show what an agent id resolves to on the host.

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::AgentArgs;

/// Run `berth identity`. Uses the reserved port if the agent holds one.
///
/// # Errors
///
/// Returns an error if the agent id is invalid or the port table cannot be
/// read.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let controller = app.controller()?;
    let identity = controller.identity(&args.agent_id).await?;
    let settings = controller.settings();
    let unit_path = identity.unit_path(&settings.placement);
    let address = identity.external_address(&settings.public_host);

    app.renderer()
        .render_identity(&identity, &unit_path, &address)
}
