//! JSON output helpers for `--json` mode.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use berth_common::{AgentStats, CreateOutcome};
use serde::Serialize;
use serde_json::json;

use crate::application::services::health_monitor::CycleReport;
use crate::domain::config::BerthConfig;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::AgentIdentity;
use crate::output::Transition;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}

/// Stable machine-readable code for a failed command.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    use crate::domain::error::{ConfigError, LifecycleError, ValidationError};
    if let Some(err) = err.downcast_ref::<LifecycleError>() {
        return match err {
            LifecycleError::Validation(_) => "validation",
            LifecycleError::Transport(_) => "transport",
            LifecycleError::StartFailed { .. } => "start_failed",
            LifecycleError::CommandFailed { .. } => "command_failed",
            LifecycleError::NotFound(_) => "not_found",
            LifecycleError::Placement(_) => "placement",
            LifecycleError::Lock(_) => "lock",
        };
    }
    if err.downcast_ref::<ValidationError>().is_some() {
        return "validation";
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return "config";
    }
    "error"
}

// ── JsonRenderer ─────────────────────────────────────────────────────────────

/// Prints every result as one pretty JSON document on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackedEntry<'a> {
    #[serde(flatten)]
    agent: &'a TrackedAgent,
    port: Option<u16>,
}

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(self, version: &str) -> Result<()> {
        print(&json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_created(self, agent_id: &str, outcome: &CreateOutcome, tracked: bool) -> Result<()> {
        print(&json!({
            "agentId": agent_id,
            "state": "active",
            "externalAddress": outcome.external_address,
            "tracked": tracked,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_transition(self, transition: &Transition<'_>) -> Result<()> {
        let mut value = json!({
            "agentId": transition.agent_id,
            "state": transition.state,
        });
        if let Some(address) = transition.address {
            value["externalAddress"] = json!(address);
        }
        if let Some(untracked) = transition.untracked {
            value["untracked"] = json!(untracked);
        }
        print(&value)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_files_updated(self, agent_id: &str, paths: &[&str]) -> Result<()> {
        print(&json!({ "agentId": agent_id, "updated": paths }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_stats(self, agent_id: &str, stats: Option<&AgentStats>) -> Result<()> {
        print(&json!({
            "agentId": agent_id,
            "installed": stats.is_some(),
            "stats": stats,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_logs(self, agent_id: &str, logs: &str) -> Result<()> {
        print(&json!({ "agentId": agent_id, "logs": logs }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_track(self, agent: &TrackedAgent) -> Result<()> {
        print(agent)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_untrack(self, agent_id: &str, removed: bool) -> Result<()> {
        print(&json!({ "agentId": agent_id, "untracked": removed }))
    }

    /// Tracked agents with their reserved port, `null` when none is held.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_tracked(self, agents: &[TrackedAgent], ports: &BTreeMap<String, u16>) -> Result<()> {
        let entries: Vec<TrackedEntry<'_>> = agents
            .iter()
            .map(|agent| TrackedEntry {
                agent,
                port: ports.get(&agent.agent_id).copied(),
            })
            .collect();
        print(&entries)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_cycle(self, report: &CycleReport) -> Result<()> {
        print(report)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_identity(self, identity: &AgentIdentity, unit_path: &str, address: &str) -> Result<()> {
        print(&json!({
            "agentId": identity.agent_id,
            "serviceName": identity.service_name,
            "profileName": identity.profile_name,
            "stateDir": identity.state_dir,
            "workspaceDir": identity.workspace_dir(),
            "configPath": identity.config_path(),
            "envPath": identity.env_path(),
            "unitPath": unit_path,
            "port": identity.port,
            "address": address,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(self, config: &BerthConfig, path: &Path) -> Result<()> {
        print(&json!({ "path": path, "config": config }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config_path(self, path: &Path) -> Result<()> {
        print(&json!({ "path": path }))
    }
}
