//! Application context: unified state passed to every command handler.
//!
//! Constructed once in `Cli::run()` from the global flags and the loaded
//! configuration. Commands build the lifecycle controller and the registry
//! from it on demand, so a command that never touches the host never
//! opens an SSH connection or an HTTP client.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::application::services::lifecycle::{LifecycleController, LifecycleSettings};
use crate::application::services::registry::AgentRegistry;
use crate::domain::config::BerthConfig;
use crate::infra::config::YamlConfigStore;
use crate::infra::host::HostBackend;
use crate::infra::reporter::ReporterBackend;
use crate::infra::state::{
    FileAgentLocks, JsonPortReservations, JsonTrackedStore, default_data_dir,
};
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// The controller wired to the configured host, reporter, port table and
/// agent lock files.
pub type Controller =
    LifecycleController<HostBackend, ReporterBackend, JsonPortReservations, FileAgentLocks>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Renderer for `mode`, for code paths that run before an `AppContext` exists.
#[must_use]
pub fn renderer_for(mode: OutputMode, output: &OutputContext) -> Renderer<'_> {
    match mode {
        OutputMode::Human => Renderer::Human(HumanRenderer::new(output)),
        OutputMode::Json => Renderer::Json(JsonRenderer),
    }
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

impl OutputFlags {
    #[must_use]
    pub fn mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Effective configuration.
    pub config: BerthConfig,
    /// Where the config was loaded from (or would be).
    pub config_path: PathBuf,
    /// Directory holding the port table and the tracked-agent registry.
    pub data_dir: PathBuf,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is unreadable or invalid,
    /// or if no data directory can be determined.
    pub fn new(flags: &OutputFlags) -> Result<Self> {
        Self::with_store(flags, &YamlConfigStore)
    }

    /// Like [`AppContext::new`] with an explicit config store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to load or no data directory can
    /// be determined.
    pub fn with_store(flags: &OutputFlags, store: &impl ConfigStore) -> Result<Self> {
        let config = store.load()?;
        let config_path = store.path()?;
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };

        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            mode: flags.mode(),
            config,
            config_path,
            data_dir,
        })
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        renderer_for(self.mode, &self.output)
    }

    /// Lifecycle controller for the configured host.
    ///
    /// # Errors
    ///
    /// Returns an error if the status webhook client cannot be built.
    pub fn controller(&self) -> Result<Controller> {
        let reporter = ReporterBackend::from_config(&self.config.reporter)
            .context("cannot set up status reporting")?;
        Ok(LifecycleController::new(
            HostBackend::from_config(&self.config.host),
            reporter,
            self.ports(),
            FileAgentLocks::new(&self.data_dir),
            LifecycleSettings::from_config(&self.config),
        ))
    }

    #[must_use]
    pub fn ports(&self) -> JsonPortReservations {
        JsonPortReservations::new(&self.data_dir)
    }

    /// Tracked-agent registry backed by the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file exists but cannot be read.
    pub async fn registry(&self) -> Result<AgentRegistry<JsonTrackedStore>> {
        AgentRegistry::load(JsonTrackedStore::new(&self.data_dir))
            .await
            .context("cannot load tracked agents")
    }

    /// Address recorded for agents tracked on the configured host.
    #[must_use]
    pub fn host_address(&self) -> String {
        self.config
            .host
            .address
            .clone()
            .unwrap_or_else(|| "localhost".to_string())
    }
}
