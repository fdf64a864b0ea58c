//! Command implementations

pub mod config;
pub mod create;
pub mod delete;
pub mod files;
pub mod identity;
pub mod logs;
pub mod monitor;
pub mod restart;
pub mod stats;
pub mod stop;
pub mod track;
pub mod version;

use clap::Args;

/// Arguments for commands that address a single agent.
#[derive(Args)]
pub struct AgentArgs {
    /// Agent id ([A-Za-z0-9_-], at most 64 characters)
    pub agent_id: String,
}
