//! `berth monitor`: run the health monitor.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::app::AppContext;
use crate::application::services::health_monitor::HealthMonitor;

/// Arguments for the monitor command.
#[derive(Args)]
pub struct MonitorArgs {
    /// Run a single cycle and print its summary
    #[arg(long)]
    pub once: bool,
}

/// Run `berth monitor`. Without `--once` this runs until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the controller or the registry cannot be set up.
pub async fn run(app: &AppContext, args: &MonitorArgs) -> Result<()> {
    let controller = app.controller()?;
    let registry = app.registry().await?;
    let monitor = HealthMonitor::new(
        &controller,
        controller.reporter(),
        &registry,
        app.config.monitor,
    );

    if args.once {
        let report = monitor.run_cycle().await;
        return app.renderer().render_cycle(&report);
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
    monitor.run(&cancel).await;
    Ok(())
}
