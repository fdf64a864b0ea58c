//! `berth track` / `untrack` / `tracked`: health-monitor membership.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::validate_agent_id;

/// Arguments for the track command.
#[derive(Args)]
pub struct TrackArgs {
    /// Agent id
    pub agent_id: String,

    /// Owner, included in status events and alerts
    #[arg(long)]
    pub user: Option<String>,

    /// Host address reported in alerts (default: configured host)
    #[arg(long)]
    pub host: Option<String>,
}

/// Run `berth track`.
///
/// # Errors
///
/// Returns an error if the agent id is invalid or the registry cannot be
/// written.
pub async fn track(app: &AppContext, args: &TrackArgs) -> Result<()> {
    validate_agent_id(&args.agent_id)?;
    let host = args.host.clone().unwrap_or_else(|| app.host_address());
    let agent = TrackedAgent::new(
        &args.agent_id,
        args.user.as_deref().unwrap_or_default(),
        &host,
    );
    app.registry().await?.track(agent.clone()).await?;
    app.renderer().render_track(&agent)
}

/// Run `berth untrack`.
///
/// # Errors
///
/// Returns an error if the registry cannot be written.
pub async fn untrack(app: &AppContext, args: &AgentArgs) -> Result<()> {
    let removed = app.registry().await?.untrack(&args.agent_id).await?;
    app.renderer().render_untrack(&args.agent_id, removed)
}

/// Run `berth tracked`.
///
/// # Errors
///
/// Returns an error if the registry or the port table cannot be read.
pub async fn list(app: &AppContext) -> Result<()> {
    let agents = app.registry().await?.snapshot();
    let ports = app.ports().all().await?;
    app.renderer().render_tracked(&agents, &ports)
}
