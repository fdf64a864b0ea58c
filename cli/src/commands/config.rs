//! `berth config`: inspect the effective configuration.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print the config file location
    Path,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if output serialization fails.
pub fn run(app: &AppContext, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => app.renderer().render_config(&app.config, &app.config_path),
        ConfigCommand::Path => app.renderer().render_config_path(&app.config_path),
    }
}
