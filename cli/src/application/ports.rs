//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `berth_common`; never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use berth_common::{OfflineAlert, StatusEvent};

use crate::domain::config::{BerthConfig, PlacementConfig};
use crate::domain::error::ExecError;
use crate::domain::health::TrackedAgent;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Captured result of one host command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Build from a finished process.
    #[must_use]
    pub fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output, killing it after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, ExecError>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<Output, ExecError>;
}

// ── Host Port ─────────────────────────────────────────────────────────────────

/// Runs commands on, and writes files to, the host agents live on.
///
/// A command that runs and exits nonzero is a normal `CommandOutput`; only a
/// failure to reach the host at all is an `ExecError`.
#[allow(async_fn_in_trait)]
pub trait HostExecutor {
    /// Address of the host, for logs and alerts.
    fn host(&self) -> &str;
    /// Run one shell command line on the host.
    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError>;
    /// Create or overwrite `path` with `content`, creating parent directories.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<CommandOutput, ExecError>;
}

// ── Reporting Port ────────────────────────────────────────────────────────────

/// Pushes state transitions to the system of record.
///
/// Best-effort: implementations log delivery failures and never fail the
/// lifecycle operation that triggered them.
#[allow(async_fn_in_trait)]
pub trait StatusReporter {
    async fn notify(&self, event: StatusEvent);
    async fn alert(&self, alert: OfflineAlert);
}

// ── State Ports ───────────────────────────────────────────────────────────────

/// Port reservation table. One port per agent, no two agents share a port.
#[allow(async_fn_in_trait)]
pub trait PortReservations {
    /// Return the agent's reservation, allocating one if it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is exhausted or the table cannot be
    /// persisted.
    async fn reserve(&self, agent_id: &str, placement: &PlacementConfig) -> Result<u16>;
    /// Current reservation, if any.
    async fn lookup(&self, agent_id: &str) -> Result<Option<u16>>;
    /// Drop the reservation. Releasing an unknown agent is a no-op.
    async fn release(&self, agent_id: &str) -> Result<()>;
}

/// Persistence for the set of agents the health monitor watches.
///
/// Several processes share one store, so changes are expressed as an update
/// applied to the current content rather than a wholesale overwrite.
#[allow(async_fn_in_trait)]
pub trait TrackedAgentStore {
    async fn load(&self) -> Result<Vec<TrackedAgent>>;
    /// Apply `change` to the stored set atomically with respect to every
    /// other writer. `change` returns whether it modified the set; the result
    /// is that flag and the set as stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    async fn update<F>(&self, change: F) -> Result<(bool, Vec<TrackedAgent>)>
    where
        F: FnOnce(&mut Vec<TrackedAgent>) -> bool + Send + 'static;
}

// ── Lock Port ─────────────────────────────────────────────────────────────────

/// Per-agent exclusion shared by every process working on the same agents.
#[allow(async_fn_in_trait)]
pub trait SharedAgentLocks {
    /// Releases the lock when dropped.
    type Guard;
    /// Wait until no other holder has `agent_id`, then hold it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken at all.
    async fn lock(&self, agent_id: &str) -> Result<Self::Guard>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts where orchestrator configuration comes from.
pub trait ConfigStore {
    /// Load configuration, returning defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<BerthConfig>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
