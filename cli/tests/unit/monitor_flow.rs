//! Health monitor driving the real lifecycle controller.

#![allow(clippy::unwrap_used)]

use berth_cli::application::services::health_monitor::HealthMonitor;
use berth_cli::application::services::lifecycle::LifecycleController;
use berth_cli::application::services::registry::AgentRegistry;
use berth_cli::domain::config::{MonitorConfig, PlacementConfig};
use berth_cli::domain::health::TrackedAgent;
use berth_cli::infra::state::{FileAgentLocks, JsonPortReservations, JsonTrackedStore};
use berth_common::AgentRuntimeState;

use crate::helpers::{RecordingReporter, ScriptedHost, exit, fast_settings, ok};

const MONITOR: MonitorConfig = MonitorConfig {
    interval_secs: 60,
    max_failures: 3,
};

async fn registry_with(dir: &tempfile::TempDir, agent_id: &str) -> AgentRegistry<JsonTrackedStore> {
    let registry = AgentRegistry::load(JsonTrackedStore::new(dir.path()))
        .await
        .unwrap();
    registry
        .track(TrackedAgent::new(agent_id, "user-1", "10.0.0.5"))
        .await
        .unwrap();
    registry
}

#[tokio::test]
async fn third_consecutive_failure_restarts_once() {
    let dir = tempfile::tempdir().unwrap();
    let host = ScriptedHost::default();
    host.on(
        "is-active",
        &[
            exit(3, "inactive\n"),
            exit(3, "inactive\n"),
            exit(3, "inactive\n"),
            ok("active\n"),
        ],
    );
    let reporter = RecordingReporter::default();
    let ctl = LifecycleController::new(
        host.clone(),
        reporter.clone(),
        JsonPortReservations::new(dir.path()),
        FileAgentLocks::new(dir.path()),
        fast_settings(PlacementConfig::default()),
    );
    let registry = registry_with(&dir, "a1").await;
    let monitor = HealthMonitor::new(&ctl, &reporter, &registry, MONITOR);

    let first = monitor.run_cycle().await;
    let second = monitor.run_cycle().await;
    assert_eq!((first.failing, second.failing), (1, 1));
    assert!(first.restarted.is_empty() && second.restarted.is_empty());

    let third = monitor.run_cycle().await;
    assert_eq!(third.restarted, vec!["a1".to_string()]);
    assert_eq!(host.count("systemctl restart berth-agent-a1"), 1);
    assert_eq!(
        reporter.states(),
        vec![AgentRuntimeState::Restarting, AgentRuntimeState::Active]
    );

    let fourth = monitor.run_cycle().await;
    assert_eq!(fourth.healthy, 1);
    assert_eq!(host.count("systemctl restart"), 1);
    assert!(reporter.alerts().is_empty());
}

#[tokio::test]
async fn restart_that_does_not_come_up_raises_one_alert() {
    let dir = tempfile::tempdir().unwrap();
    let host = ScriptedHost::default();
    host.on("is-active", &[exit(3, "failed\n")]);
    host.on("journalctl", &[ok("segfault\n")]);
    let reporter = RecordingReporter::default();
    let ctl = LifecycleController::new(
        host.clone(),
        reporter.clone(),
        JsonPortReservations::new(dir.path()),
        FileAgentLocks::new(dir.path()),
        fast_settings(PlacementConfig::default()),
    );
    let registry = registry_with(&dir, "a1").await;
    let monitor = HealthMonitor::new(&ctl, &reporter, &registry, MONITOR);

    for _ in 0..3 {
        monitor.run_cycle().await;
    }

    let alerts = reporter.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].agent_id, "a1");
    assert_eq!(alerts[0].host_address, "10.0.0.5");
    assert_eq!(alerts[0].user_id.as_deref(), Some("user-1"));
    assert_eq!(alerts[0].consecutive_failures, 3);
    assert_eq!(
        reporter.states(),
        vec![AgentRuntimeState::Restarting, AgentRuntimeState::Offline]
    );

    // The counter was reset, so the next two failures stay below threshold.
    monitor.run_cycle().await;
    monitor.run_cycle().await;
    assert_eq!(host.count("systemctl restart"), 1);
}

#[tokio::test]
async fn agent_untracked_by_another_process_is_dropped_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let host = ScriptedHost::default();
    host.on("is-active", &[ok("active\n")]);
    let reporter = RecordingReporter::default();
    let ctl = LifecycleController::new(
        host.clone(),
        reporter.clone(),
        JsonPortReservations::new(dir.path()),
        FileAgentLocks::new(dir.path()),
        fast_settings(PlacementConfig::default()),
    );
    let registry = registry_with(&dir, "a1").await;
    let monitor = HealthMonitor::new(&ctl, &reporter, &registry, MONITOR);
    assert_eq!(monitor.run_cycle().await.checked, 1);

    let other = AgentRegistry::load(JsonTrackedStore::new(dir.path()))
        .await
        .unwrap();
    assert!(other.untrack("a1").await.unwrap());

    assert_eq!(monitor.run_cycle().await.checked, 0);
}
