//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags, renderer_for};
use crate::commands;
use crate::output::OutputContext;

/// Provision, run and supervise AI agent runtimes on a host
#[derive(Parser)]
#[command(
    name = "berth",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision an agent and start it
    Create(commands::create::CreateArgs),

    /// Stop an agent (keeps its files and port)
    Stop(commands::AgentArgs),

    /// Restart an agent and wait for it to come back
    Restart(commands::AgentArgs),

    /// Remove an agent's service, files and port reservation
    Delete(commands::AgentArgs),

    /// Replace files in an agent's workspace without restarting it
    UpdateFiles(commands::files::UpdateFilesArgs),

    /// Show service state, PID and memory of an agent
    Stats(commands::AgentArgs),

    /// Show recent runtime output of an agent
    Logs(commands::logs::LogsArgs),

    /// Add an agent to health monitoring
    Track(commands::track::TrackArgs),

    /// Remove an agent from health monitoring
    Untrack(commands::AgentArgs),

    /// List monitored agents
    Tracked,

    /// Run the health monitor
    Monitor(commands::monitor::MonitorArgs),

    /// Show the service name, paths and port derived for an agent
    Identity(commands::AgentArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            command,
        } = self;

        let flags = OutputFlags {
            no_color,
            quiet,
            json,
        };

        // Only commands that need it load the config, so `version` works
        // even with a broken config file.
        let app = || AppContext::new(&flags);

        match command {
            Command::Create(args) => commands::create::run(&app()?, &args).await,
            Command::Stop(args) => commands::stop::run(&app()?, &args).await,
            Command::Restart(args) => commands::restart::run(&app()?, &args).await,
            Command::Delete(args) => commands::delete::run(&app()?, &args).await,
            Command::UpdateFiles(args) => commands::files::run(&app()?, &args).await,
            Command::Stats(args) => commands::stats::run(&app()?, &args).await,
            Command::Logs(args) => commands::logs::run(&app()?, &args).await,
            Command::Track(args) => commands::track::track(&app()?, &args).await,
            Command::Untrack(args) => commands::track::untrack(&app()?, &args).await,
            Command::Tracked => commands::track::list(&app()?).await,
            Command::Monitor(args) => commands::monitor::run(&app()?, &args).await,
            Command::Identity(args) => commands::identity::run(&app()?, &args).await,
            Command::Config(cmd) => commands::config::run(&app()?, &cmd),
            Command::Version => {
                let output = OutputContext::new(no_color, quiet);
                commands::version::run(&renderer_for(flags.mode(), &output))
            }
        }
    }
}
