//! `berth create`: provision an agent, start it and begin monitoring it.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use berth_common::ProvisioningRequest;
use clap::Args;

use crate::app::AppContext;
use crate::domain::health::TrackedAgent;

/// Arguments for the create command.
#[derive(Args)]
pub struct CreateArgs {
    /// Provisioning request as JSON; `-` reads standard input
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,

    /// Do not add the agent to health monitoring
    #[arg(long)]
    pub no_track: bool,
}

/// Run `berth create`.
///
/// # Errors
///
/// Returns an error if the request cannot be read or parsed, or if any
/// lifecycle step fails.
pub async fn run(app: &AppContext, args: &CreateArgs) -> Result<()> {
    let request = read_request(&args.request)?;
    let controller = app.controller()?;

    app.renderer()
        .progress(&format!("Provisioning agent {}...", request.agent_id));
    let outcome = controller.create(&request).await?;

    let tracked = !args.no_track;
    if tracked {
        let registry = app.registry().await?;
        registry
            .track(TrackedAgent::new(
                &request.agent_id,
                &request.user_id,
                &app.host_address(),
            ))
            .await
            .context("agent is running but could not be added to monitoring")?;
    }

    app.renderer()
        .render_created(&request.agent_id, &outcome, tracked)
}

/// Parse a provisioning request from `path`, or stdin for `-`.
///
/// # Errors
///
/// Returns an error if the input cannot be read or is not a valid request.
pub fn read_request(path: &Path) -> Result<ProvisioningRequest> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("cannot read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read request {}", path.display()))?
    };
    serde_json::from_str(&content).context("request is not a valid provisioning request")
}
