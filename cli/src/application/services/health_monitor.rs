//! Health monitor: periodic liveness checks with bounded auto-restart.
//!
//! Each cycle checks every tracked agent in turn. A failed or erroring check
//! increments the agent's counter; reaching `max_failures` triggers exactly
//! one restart, after which the counter starts again from zero. A restart
//! that fails is escalated as an offline alert.

use std::time::Duration;

use berth_common::OfflineAlert;
use chrono::Utc;
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{
    HostExecutor, PortReservations, SharedAgentLocks, StatusReporter, TrackedAgentStore,
};
use crate::application::services::lifecycle::LifecycleController;
use crate::application::services::registry::AgentRegistry;
use crate::domain::config::MonitorConfig;
use crate::domain::error::LifecycleError;
use crate::domain::health::{CheckVerdict, TrackedAgent};

/// What the monitor needs from the lifecycle controller.
#[allow(async_fn_in_trait)]
pub trait Supervisor {
    async fn is_active(&self, agent_id: &str) -> Result<bool, LifecycleError>;
    async fn restart(&self, agent_id: &str, user_id: Option<&str>) -> Result<(), LifecycleError>;
}

impl<E, R, P, L> Supervisor for LifecycleController<E, R, P, L>
where
    E: HostExecutor,
    R: StatusReporter,
    P: PortReservations,
    L: SharedAgentLocks,
{
    async fn is_active(&self, agent_id: &str) -> Result<bool, LifecycleError> {
        LifecycleController::is_active(self, agent_id).await
    }

    async fn restart(&self, agent_id: &str, user_id: Option<&str>) -> Result<(), LifecycleError> {
        LifecycleController::restart(self, agent_id, user_id).await
    }
}

/// Summary of one monitoring cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub checked: usize,
    pub healthy: usize,
    pub failing: usize,
    pub restarted: Vec<String>,
    pub alerted: Vec<String>,
}

pub struct HealthMonitor<'a, S, R, T> {
    supervisor: &'a S,
    reporter: &'a R,
    registry: &'a AgentRegistry<T>,
    config: MonitorConfig,
}

impl<'a, S, R, T> HealthMonitor<'a, S, R, T>
where
    S: Supervisor,
    R: StatusReporter,
    T: TrackedAgentStore,
{
    pub fn new(
        supervisor: &'a S,
        reporter: &'a R,
        registry: &'a AgentRegistry<T>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            supervisor,
            reporter,
            registry,
            config,
        }
    }

    /// Run cycles every `interval_secs` until `cancel` fires. The first cycle
    /// runs immediately.
    pub async fn run(&self, cancel: &CancellationToken) {
        info!(
            interval_secs = self.config.interval_secs,
            max_failures = self.config.max_failures,
            "health monitor started"
        );
        let mut tick = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.run_cycle().await;
                    info!(
                        checked = report.checked,
                        healthy = report.healthy,
                        failing = report.failing,
                        restarted = report.restarted.len(),
                        alerted = report.alerted.len(),
                        "health cycle completed"
                    );
                }
                () = cancel.cancelled() => {
                    info!("shutdown requested, stopping health monitor");
                    break;
                }
            }
        }
    }

    /// Check every tracked agent once. One agent's error never stops the
    /// others from being checked.
    pub async fn run_cycle(&self) -> CycleReport {
        if let Err(err) = self.registry.sync().await {
            warn!(error = %format!("{err:#}"), "could not refresh tracked agents; using last known set");
        }
        let mut report = CycleReport::default();
        for agent in self.registry.snapshot() {
            report.checked += 1;
            if self.check(&agent, &mut report).await {
                report.healthy += 1;
            } else {
                report.failing += 1;
            }
        }
        report
    }

    async fn check(&self, agent: &TrackedAgent, report: &mut CycleReport) -> bool {
        let agent_id = agent.agent_id.as_str();
        match self.supervisor.is_active(agent_id).await {
            Ok(true) => {
                self.registry.record_success(agent_id);
                return true;
            }
            Ok(false) => debug!(agent_id, "liveness check failed"),
            Err(err) => warn!(agent_id, error = %err, "liveness check errored"),
        }

        match self
            .registry
            .record_failure(agent_id, self.config.max_failures)
        {
            None | Some(CheckVerdict::Healthy) => {}
            Some(CheckVerdict::Degraded { failures }) => {
                warn!(agent_id, failures, "agent unhealthy");
            }
            Some(CheckVerdict::RestartDue) => {
                self.recover(agent, report).await;
            }
        }
        false
    }

    async fn recover(&self, agent: &TrackedAgent, report: &mut CycleReport) {
        let agent_id = agent.agent_id.as_str();
        let user_id = Some(agent.user_id.as_str()).filter(|u| !u.is_empty());
        warn!(agent_id, failures = self.config.max_failures, "restarting unhealthy agent");

        match self.supervisor.restart(agent_id, user_id).await {
            Ok(()) => {
                info!(agent_id, "automatic restart succeeded");
                report.restarted.push(agent_id.to_string());
            }
            Err(err) => {
                warn!(agent_id, error = %err, "automatic restart failed; raising alert");
                self.reporter
                    .alert(OfflineAlert {
                        agent_id: agent_id.to_string(),
                        user_id: user_id.map(str::to_string),
                        host_address: agent.host_address.clone(),
                        consecutive_failures: self.config.max_failures,
                        reason: err.to_string(),
                        at: Utc::now(),
                    })
                    .await;
                report.alerted.push(agent_id.to_string());
            }
        }
        self.registry.reset(agent_id);
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
