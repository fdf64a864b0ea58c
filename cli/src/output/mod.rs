//! Output formatting module

pub mod human;
pub mod json;
pub mod styles;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use berth_common::{AgentRuntimeState, AgentStats, CreateOutcome};
use console::Term;
use owo_colors::OwoColorize as _;
pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use styles::Styles;

use crate::application::services::health_monitor::CycleReport;
use crate::domain::config::BerthConfig;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::AgentIdentity;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }

    /// Service or agent state, colored by health.
    #[must_use]
    pub fn state(&self, state: &str) -> String {
        let style = match state {
            "active" => self.styles.success,
            "failed" | "offline" => self.styles.error,
            "activating" | "restarting" | "provisioning" => self.styles.warning,
            _ => self.styles.dim,
        };
        format!("{}", state.style(style))
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// What a lifecycle command did, for rendering.
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub agent_id: &'a str,
    pub state: AgentRuntimeState,
    /// Reachable address after a (re)start.
    pub address: Option<&'a str>,
    /// Whether the agent was dropped from monitoring.
    pub untracked: Option<bool>,
}

/// Dispatches to the human or JSON renderer for the current output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// Print a progress line. JSON mode stays silent.
    pub fn progress(&self, msg: &str) {
        if let Renderer::Human(r) = self {
            r.progress(msg);
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Renderer::Json(r) => r.render_version(version),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_created(
        &self,
        agent_id: &str,
        outcome: &CreateOutcome,
        tracked: bool,
    ) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_created(agent_id, outcome, tracked);
                Ok(())
            }
            Renderer::Json(r) => r.render_created(agent_id, outcome, tracked),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_transition(&self, transition: &Transition<'_>) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_transition(transition);
                Ok(())
            }
            Renderer::Json(r) => r.render_transition(transition),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_files_updated(&self, agent_id: &str, paths: &[&str]) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_files_updated(paths);
                Ok(())
            }
            Renderer::Json(r) => r.render_files_updated(agent_id, paths),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_stats(&self, agent_id: &str, stats: Option<&AgentStats>) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_stats(agent_id, stats);
                Ok(())
            }
            Renderer::Json(r) => r.render_stats(agent_id, stats),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_logs(&self, agent_id: &str, logs: &str) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_logs(logs);
                Ok(())
            }
            Renderer::Json(r) => r.render_logs(agent_id, logs),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_track(&self, agent: &TrackedAgent) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_track(agent);
                Ok(())
            }
            Renderer::Json(r) => r.render_track(agent),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_untrack(&self, agent_id: &str, removed: bool) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_untrack(agent_id, removed);
                Ok(())
            }
            Renderer::Json(r) => r.render_untrack(agent_id, removed),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_tracked(
        &self,
        agents: &[TrackedAgent],
        ports: &BTreeMap<String, u16>,
    ) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_tracked(agents, ports);
                Ok(())
            }
            Renderer::Json(r) => r.render_tracked(agents, ports),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_cycle(&self, report: &CycleReport) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_cycle(report);
                Ok(())
            }
            Renderer::Json(r) => r.render_cycle(report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_identity(
        &self,
        identity: &AgentIdentity,
        unit_path: &str,
        address: &str,
    ) -> Result<()> {
        match self {
            Renderer::Human(r) => {
                r.render_identity(identity, unit_path, address);
                Ok(())
            }
            Renderer::Json(r) => r.render_identity(identity, unit_path, address),
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &BerthConfig, path: &Path) -> Result<()> {
        match self {
            Renderer::Human(r) => r.render_config(config, path),
            Renderer::Json(r) => r.render_config(config, path),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config_path(&self, path: &Path) -> Result<()> {
        match self {
            Renderer::Human(_) => {
                println!("{}", path.display());
                Ok(())
            }
            Renderer::Json(r) => r.render_config_path(path),
        }
    }
}
