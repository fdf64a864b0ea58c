//! Human-readable terminal renderer.

use std::collections::BTreeMap;
use std::path::Path;

use berth_common::{AgentRuntimeState, AgentStats, CreateOutcome};
use owo_colors::OwoColorize as _;

use crate::application::services::health_monitor::CycleReport;
use crate::domain::config::BerthConfig;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::AgentIdentity;
use crate::output::{OutputContext, Transition};

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("berth {version}");
    }

    pub fn progress(&self, msg: &str) {
        self.ctx.info(msg);
    }

    pub fn render_created(&self, agent_id: &str, outcome: &CreateOutcome, tracked: bool) {
        self.ctx.success(&format!("Agent {agent_id} is active"));
        self.ctx.kv("Address:", &outcome.external_address);
        if !tracked {
            self.ctx
                .info(&format!("Not monitored. Track it: berth track {agent_id}"));
        }
    }

    pub fn render_transition(&self, transition: &Transition<'_>) {
        let agent_id = transition.agent_id;
        match transition.state {
            AgentRuntimeState::Stopped => {
                self.ctx
                    .success(&format!("Agent {agent_id} stopped. Files and port are kept."));
                self.ctx.info(&format!("Resume: berth restart {agent_id}"));
            }
            AgentRuntimeState::Deleted => {
                self.ctx.success(&format!("Agent {agent_id} deleted"));
            }
            state => {
                self.ctx
                    .success(&format!("Agent {agent_id} is {}", self.ctx.state(state.as_str())));
            }
        }
        if let Some(address) = transition.address {
            self.ctx.kv("Address:", address);
        }
    }

    pub fn render_files_updated(&self, paths: &[&str]) {
        for path in paths {
            self.ctx.success(&format!("Updated {path}"));
        }
    }

    /// Logs are printed as-is, even in quiet mode.
    pub fn render_logs(&self, logs: &str) {
        print!("{logs}");
        if !logs.is_empty() && !logs.ends_with('\n') {
            println!();
        }
    }

    pub fn render_track(&self, agent: &TrackedAgent) {
        self.ctx.success(&format!(
            "Tracking {} on {}",
            agent.agent_id, agent.host_address
        ));
    }

    pub fn render_untrack(&self, agent_id: &str, removed: bool) {
        if removed {
            self.ctx.success(&format!("Stopped tracking {agent_id}"));
        } else {
            self.ctx.info(&format!("{agent_id} was not tracked"));
        }
    }

    /// Render the names and paths derived for an agent.
    pub fn render_identity(&self, identity: &AgentIdentity, unit_path: &str, address: &str) {
        self.ctx.header(&identity.agent_id);
        self.ctx.kv("Service: ", &identity.service_name);
        self.ctx.kv("Profile: ", &identity.profile_name);
        self.ctx.kv("State:   ", &identity.state_dir);
        self.ctx.kv("Config:  ", &identity.config_path());
        self.ctx.kv("Env:     ", &identity.env_path());
        self.ctx.kv("Unit:    ", unit_path);
        self.ctx.kv("Address: ", address);
    }

    /// Render service stats; `None` means the host has no such service.
    pub fn render_stats(&self, agent_id: &str, stats: Option<&AgentStats>) {
        let Some(stats) = stats else {
            self.ctx.info(&format!("Agent {agent_id} is not installed on this host."));
            return;
        };
        if self.ctx.quiet {
            return;
        }
        self.ctx.kv("Status: ", &self.ctx.state(&stats.status));
        if let Some(since) = &stats.uptime_marker {
            self.ctx.kv("Since:  ", since);
        }
        if let Some(pid) = stats.pid {
            self.ctx.kv("PID:    ", &pid.to_string());
        }
        if let Some(bytes) = stats.memory_usage {
            self.ctx.kv("Memory: ", &format_bytes(bytes));
        }
        self.ctx.kv("Address:", &stats.address);
    }

    /// Render the tracked-agent registry with each agent's reserved port.
    pub fn render_tracked(&self, agents: &[TrackedAgent], ports: &BTreeMap<String, u16>) {
        if agents.is_empty() {
            self.ctx.info("No agents are tracked.");
            self.ctx.info("Track one: berth track <agent-id> --host <address>");
            return;
        }
        if self.ctx.quiet {
            return;
        }
        println!(
            "  {:<24} {:<20} {:<8} {}",
            "AGENT".style(self.ctx.styles.header),
            "HOST".style(self.ctx.styles.header),
            "PORT".style(self.ctx.styles.header),
            "USER".style(self.ctx.styles.header),
        );
        for agent in agents {
            let port = ports
                .get(&agent.agent_id)
                .map_or_else(|| "-".to_string(), u16::to_string);
            println!(
                "  {:<24} {:<20} {:<8} {}",
                agent.agent_id,
                agent.host_address,
                port,
                display_user(&agent.user_id).style(self.ctx.styles.dim),
            );
        }
    }

    /// Render the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn render_config(&self, config: &BerthConfig, path: &Path) -> anyhow::Result<()> {
        self.ctx.kv("File:", &path.display().to_string());
        if self.ctx.quiet {
            return Ok(());
        }
        println!();
        let yaml = serde_yaml::to_string(config)?;
        for line in yaml.lines() {
            println!("  {line}");
        }
        Ok(())
    }

    pub fn render_cycle(&self, report: &CycleReport) {
        if report.checked == 0 {
            self.ctx.info("No agents are tracked.");
            return;
        }
        if report.failing == 0 {
            self.ctx
                .success(&format!("{} of {} agents healthy", report.healthy, report.checked));
        } else {
            self.ctx.warn(&format!(
                "{} of {} agents failing",
                report.failing, report.checked
            ));
        }
        for id in &report.restarted {
            self.ctx.info(&format!("Restarted {id}"));
        }
        for id in &report.alerted {
            self.ctx.error(&format!("{id} is offline: automatic restart failed"));
        }
    }
}

fn display_user(user_id: &str) -> &str {
    if user_id.is_empty() { "-" } else { user_id }
}

/// Format a byte count as KiB/MiB/GiB with one decimal.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
