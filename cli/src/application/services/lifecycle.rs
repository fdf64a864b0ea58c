//! Lifecycle controller: create, stop, restart, delete and inspect agents.
//!
//! Each operation is a fixed sequence of host commands. Operations on one
//! agent are serialized through [`AgentLocks`] within the process and through
//! a [`SharedAgentLocks`] port across processes; different agents proceed
//! independently. Every state transition is reported exactly once.

use berth_common::{
    AgentRuntimeState, AgentStats, CreateOutcome, FileSpec, ProvisioningRequest, StatusEvent,
};
use tokio::time::Instant;

use tokio::sync::OwnedMutexGuard;

use crate::application::ports::{
    CommandOutput, HostExecutor, PortReservations, SharedAgentLocks, StatusReporter,
};
use crate::application::services::locks::AgentLocks;
use crate::domain::config::{BerthConfig, PlacementConfig, ReadinessConfig, RuntimeConfig};
use crate::domain::error::{ExecError, LifecycleError};
use crate::domain::identity::{AgentIdentity, resolve, validate_agent_id};
use crate::domain::render::{self, RenderedAgent, RenderedFile};
use crate::domain::systemd::{self, ActiveState};
use crate::domain::unit;

/// Lines of runtime log attached to a failed start.
pub const DEFAULT_LOG_TAIL_LINES: u32 = 50;

/// Floor for the readiness poll interval so a zero delay cannot spin.
const MIN_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Everything the controller needs from configuration.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub placement: PlacementConfig,
    pub runtime: RuntimeConfig,
    pub readiness: ReadinessConfig,
    /// Host part of the externally reachable address.
    pub public_host: String,
    pub log_tail_lines: u32,
}

impl LifecycleSettings {
    #[must_use]
    pub fn from_config(config: &BerthConfig) -> Self {
        Self {
            placement: config.placement.clone(),
            runtime: config.runtime.clone(),
            readiness: config.readiness,
            public_host: config.host.public_host(),
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }
}

/// Outcome of waiting for a freshly (re)started service.
enum Readiness {
    Active,
    NotActive(ActiveState),
}

pub struct LifecycleController<E, R, P, L> {
    host: E,
    reporter: R,
    ports: P,
    settings: LifecycleSettings,
    locks: AgentLocks,
    shared_locks: L,
}

impl<E, R, P, L> LifecycleController<E, R, P, L>
where
    E: HostExecutor,
    R: StatusReporter,
    P: PortReservations,
    L: SharedAgentLocks,
{
    pub fn new(
        host: E,
        reporter: R,
        ports: P,
        shared_locks: L,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            host,
            reporter,
            ports,
            settings,
            locks: AgentLocks::new(),
            shared_locks,
        }
    }

    pub fn host(&self) -> &E {
        &self.host
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Identity of an existing agent: derived names plus its reserved port,
    /// or the preferred port if it holds no reservation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad id and `Placement` if the reservation
    /// table cannot be read.
    pub async fn identity(&self, agent_id: &str) -> Result<AgentIdentity, LifecycleError> {
        validate_agent_id(agent_id)?;
        let identity = resolve(agent_id, &self.settings.placement);
        let reserved = self.ports.lookup(agent_id).await.map_err(placement_error)?;
        Ok(match reserved {
            Some(port) => identity.with_port(port),
            None => identity,
        })
    }

    // ── create ──────────────────────────────────────────────────────────────

    /// Provision, register and start an agent, then wait for it to be active.
    ///
    /// Safe to rerun with the same agent id: the identity is the same and every
    /// file is overwritten.
    ///
    /// # Errors
    ///
    /// - `Validation` before anything touches the host
    /// - `Placement` when no port is free
    /// - `Transport` when the host cannot be reached
    /// - `CommandFailed` when a provisioning step exits nonzero
    /// - `StartFailed` with the runtime's log tail when it does not come up
    pub async fn create(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<CreateOutcome, LifecycleError> {
        let agent_id = request.agent_id.as_str();
        let user_id = Some(request.user_id.as_str());
        validate_agent_id(agent_id)?;
        let _guard = self.exclusive(agent_id).await?;

        let had_reservation = self
            .ports
            .lookup(agent_id)
            .await
            .map_err(placement_error)?
            .is_some();
        let port = self
            .ports
            .reserve(agent_id, &self.settings.placement)
            .await
            .map_err(placement_error)?;
        let identity = resolve(agent_id, &self.settings.placement).with_port(port);

        let rendered = match render::render(&identity, request) {
            Ok(rendered) => rendered,
            Err(err) => {
                if !had_reservation {
                    self.release_port(agent_id).await;
                }
                return Err(err.into());
            }
        };
        for tool in &rendered.skipped_tools {
            tracing::warn!(agent_id, tool = %tool, "no credential variable known for tool; skipped");
        }

        tracing::info!(agent_id, service = %identity.service_name, port, "provisioning agent");
        self.notify(agent_id, user_id, AgentRuntimeState::Provisioning)
            .await;

        if let Err(err) = self.provision(&identity, &rendered, &request.runtime_version).await {
            self.report_offline(agent_id, user_id, &err.to_string()).await;
            return Err(err);
        }

        let address = self.finish_start(&identity, user_id).await?;
        Ok(CreateOutcome {
            external_address: address,
        })
    }

    async fn provision(
        &self,
        identity: &AgentIdentity,
        rendered: &RenderedAgent,
        runtime_version: &str,
    ) -> Result<(), LifecycleError> {
        self.run_checked(
            "create workspace directory",
            &systemd::make_dir(&identity.workspace_dir()),
        )
        .await?;
        self.write_checked("write config file", &rendered.config)
            .await?;
        for file in &rendered.workspace_files {
            self.write_checked("write workspace file", file).await?;
        }
        self.write_checked("write environment file", &rendered.env_file)
            .await?;
        self.run_checked(
            "restrict environment file",
            &systemd::restrict_permissions(&rendered.env_file.path),
        )
        .await?;

        let unit_file = RenderedFile {
            path: identity.unit_path(&self.settings.placement),
            content: unit::service_unit(identity, &self.settings.runtime, runtime_version),
        };
        self.write_checked("write service unit", &unit_file).await?;
        self.run_checked("reload service manager", &systemd::daemon_reload())
            .await?;

        // A unit that dies on start can still make `restart` exit nonzero;
        // the readiness check below turns that into a diagnosable failure.
        let start = self
            .host
            .execute(&systemd::enable_and_restart(&identity.service_name))
            .await?;
        if !start.success() {
            tracing::warn!(
                agent_id = %identity.agent_id,
                code = ?start.exit_code,
                stderr = %start.stderr.trim(),
                "start command exited nonzero"
            );
        }
        Ok(())
    }

    // ── stop / restart ──────────────────────────────────────────────────────

    /// Stop the service. An already stopped service is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached; `offline` is
    /// reported in that case.
    pub async fn stop(&self, agent_id: &str, user_id: Option<&str>) -> Result<(), LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let _guard = self.exclusive(agent_id).await?;

        let out = match self.host.execute(&systemd::stop(&identity.service_name)).await {
            Ok(out) => out,
            Err(err) => {
                self.report_offline(agent_id, user_id, &err.to_string()).await;
                return Err(err.into());
            }
        };
        if !out.success() {
            tracing::debug!(agent_id, stderr = %out.stderr.trim(), "stop exited nonzero; treating as stopped");
        }
        tracing::info!(agent_id, "agent stopped");
        self.notify(agent_id, user_id, AgentRuntimeState::Stopped)
            .await;
        Ok(())
    }

    /// Restart the service and wait for it to come back.
    ///
    /// `restarting` is reported before anything is sent to the host.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached and `StartFailed` if
    /// the service does not come back. Both report `offline`.
    pub async fn restart(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let _guard = self.exclusive(agent_id).await?;

        self.notify(agent_id, user_id, AgentRuntimeState::Restarting)
            .await;
        let out = match self
            .host
            .execute(&systemd::restart(&identity.service_name))
            .await
        {
            Ok(out) => out,
            Err(err) => {
                self.report_offline(agent_id, user_id, &err.to_string()).await;
                return Err(err.into());
            }
        };
        if !out.success() {
            tracing::warn!(agent_id, stderr = %out.stderr.trim(), "restart exited nonzero");
        }
        self.finish_start(&identity, user_id).await.map(|_| ())
    }

    /// Wait for readiness, then report `active` with the address or `offline`
    /// with the log tail.
    async fn finish_start(
        &self,
        identity: &AgentIdentity,
        user_id: Option<&str>,
    ) -> Result<String, LifecycleError> {
        let agent_id = identity.agent_id.as_str();
        match self.wait_until_ready(&identity.service_name).await {
            Ok(Readiness::Active) => {
                let address = identity.external_address(&self.settings.public_host);
                tracing::info!(agent_id, address = %address, "agent is active");
                self.reporter
                    .notify(
                        StatusEvent::new(agent_id, user_id, AgentRuntimeState::Active)
                            .with_address(address.clone()),
                    )
                    .await;
                Ok(address)
            }
            Ok(Readiness::NotActive(state)) => {
                tracing::warn!(agent_id, ?state, "agent did not reach active state");
                let logs = self.tail_logs(&identity.service_name).await;
                self.report_offline(agent_id, user_id, &logs).await;
                Err(LifecycleError::StartFailed {
                    agent_id: agent_id.to_string(),
                    logs,
                })
            }
            Err(err) => {
                self.report_offline(agent_id, user_id, &err.to_string()).await;
                Err(err.into())
            }
        }
    }

    /// Poll `is-active` with exponential backoff until active, failed or out
    /// of time.
    async fn wait_until_ready(&self, service: &str) -> Result<Readiness, ExecError> {
        let readiness = self.settings.readiness;
        let deadline = Instant::now() + readiness.max_wait();
        let cap = readiness.max_interval().max(MIN_POLL_INTERVAL);
        let mut delay = readiness.initial_delay();
        loop {
            tokio::time::sleep(delay).await;
            let out = self.host.execute(&systemd::is_active(service)).await?;
            let state = systemd::parse_active_state(&out.stdout);
            match state {
                ActiveState::Active => return Ok(Readiness::Active),
                ActiveState::Failed => return Ok(Readiness::NotActive(state)),
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Readiness::NotActive(state));
            }
            delay = delay
                .saturating_mul(2)
                .clamp(MIN_POLL_INTERVAL, cap)
                .min(deadline - now);
        }
    }

    // ── delete ──────────────────────────────────────────────────────────────

    /// Remove every trace of the agent from the host and release its port.
    ///
    /// Deleting an agent that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached and `CommandFailed`
    /// if a removal step exits nonzero.
    pub async fn delete(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let _guard = self.exclusive(agent_id).await?;
        let service = identity.service_name.as_str();

        for command in [systemd::stop(service), systemd::disable(service)] {
            let out = self.host.execute(&command).await?;
            if !out.success() {
                tracing::debug!(agent_id, command = %command, "ignoring nonzero exit during delete");
            }
        }
        self.run_checked(
            "remove service unit",
            &systemd::remove_file(&identity.unit_path(&self.settings.placement)),
        )
        .await?;
        self.run_checked("reload service manager", &systemd::daemon_reload())
            .await?;
        self.run_checked(
            "remove state directory",
            &systemd::remove_tree(&identity.state_dir),
        )
        .await?;
        self.ports
            .release(agent_id)
            .await
            .map_err(placement_error)?;

        tracing::info!(agent_id, "agent deleted");
        self.notify(agent_id, user_id, AgentRuntimeState::Deleted)
            .await;
        Ok(())
    }

    // ── update files ────────────────────────────────────────────────────────

    /// Overwrite files in the agent's workspace. The runtime picks them up
    /// without a restart.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for unsafe or duplicate paths and `NotFound` if
    /// the agent has no workspace on the host.
    pub async fn update_files(
        &self,
        agent_id: &str,
        files: &[FileSpec],
    ) -> Result<(), LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let rendered = render::workspace_files(&identity, files)?;
        let _guard = self.exclusive(agent_id).await?;

        let exists = self
            .host
            .execute(&systemd::dir_exists(&identity.workspace_dir()))
            .await?;
        if !exists.success() {
            return Err(LifecycleError::NotFound(agent_id.to_string()));
        }
        for file in &rendered {
            self.write_checked("write workspace file", file).await?;
        }
        tracing::info!(agent_id, count = rendered.len(), "workspace files updated");
        Ok(())
    }

    // ── inspection ──────────────────────────────────────────────────────────

    /// Service state, main PID, start time and memory. `None` if the service
    /// manager has never heard of the agent.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached.
    pub async fn get_stats(&self, agent_id: &str) -> Result<Option<AgentStats>, LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let out = self
            .host
            .execute(&systemd::show(&identity.service_name))
            .await?;
        let Some(snapshot) = systemd::parse_show(&out.stdout) else {
            return Ok(None);
        };
        let memory_usage = match snapshot.main_pid {
            Some(pid) => {
                let rss = self.host.execute(&systemd::process_rss(pid)).await?;
                if rss.success() {
                    systemd::parse_rss_bytes(&rss.stdout)
                } else {
                    None
                }
            }
            None => None,
        };
        Ok(Some(AgentStats {
            status: snapshot.active_state,
            uptime_marker: snapshot.active_since,
            pid: snapshot.main_pid,
            memory_usage,
            address: identity.external_address(&self.settings.public_host),
        }))
    }

    /// Most recent `lines` lines of the service's merged stdout/stderr.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached and `CommandFailed`
    /// if the log query exits nonzero.
    pub async fn get_logs(&self, agent_id: &str, lines: u32) -> Result<String, LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let out = self
            .run_checked(
                "read service logs",
                &systemd::journal_tail(&identity.service_name, lines),
            )
            .await?;
        Ok(out.stdout)
    }

    /// Whether the service manager reports the agent as active.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the host cannot be reached.
    pub async fn is_active(&self, agent_id: &str) -> Result<bool, LifecycleError> {
        let identity = self.identity(agent_id).await?;
        let out = self
            .host
            .execute(&systemd::is_active(&identity.service_name))
            .await?;
        Ok(systemd::parse_active_state(&out.stdout).is_active())
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    async fn run_checked(
        &self,
        step: &'static str,
        command: &str,
    ) -> Result<CommandOutput, LifecycleError> {
        let out = self.host.execute(command).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(LifecycleError::CommandFailed {
                step,
                code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    async fn write_checked(
        &self,
        step: &'static str,
        file: &RenderedFile,
    ) -> Result<(), LifecycleError> {
        let out = self
            .host
            .write_file(&file.path, file.content.as_bytes())
            .await?;
        if out.success() {
            Ok(())
        } else {
            Err(LifecycleError::CommandFailed {
                step,
                code: out.exit_code,
                stderr: format!("{}: {}", file.path, out.stderr.trim()),
            })
        }
    }

    async fn tail_logs(&self, service: &str) -> String {
        let command = systemd::journal_tail(service, self.settings.log_tail_lines);
        match self.host.execute(&command).await {
            Ok(out) if !out.stdout.trim().is_empty() => out.stdout,
            Ok(out) => out.stderr,
            Err(err) => format!("(logs unavailable: {err})"),
        }
    }

    /// Hold `agent_id` against this process first, then against every other.
    async fn exclusive(
        &self,
        agent_id: &str,
    ) -> Result<(OwnedMutexGuard<()>, L::Guard), LifecycleError> {
        let local = self.locks.acquire(agent_id).await;
        let shared = self
            .shared_locks
            .lock(agent_id)
            .await
            .map_err(lock_error)?;
        Ok((local, shared))
    }

    async fn release_port(&self, agent_id: &str) {
        if let Err(err) = self.ports.release(agent_id).await {
            tracing::warn!(agent_id, error = %err, "failed to release port reservation");
        }
    }

    async fn notify(&self, agent_id: &str, user_id: Option<&str>, state: AgentRuntimeState) {
        self.reporter
            .notify(StatusEvent::new(agent_id, user_id, state))
            .await;
    }

    async fn report_offline(&self, agent_id: &str, user_id: Option<&str>, detail: &str) {
        self.reporter
            .notify(
                StatusEvent::new(agent_id, user_id, AgentRuntimeState::Offline)
                    .with_detail(detail.trim()),
            )
            .await;
    }
}

fn lock_error(err: anyhow::Error) -> LifecycleError {
    LifecycleError::Lock(format!("{err:#}"))
}

fn placement_error(err: anyhow::Error) -> LifecycleError {
    LifecycleError::Placement(format!("{err:#}"))
}

// ── Unit tests ────────────────────────────────────────────────────────────────
