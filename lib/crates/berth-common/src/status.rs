use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime state of an agent as recorded by the system of record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentRuntimeState {
    Provisioning,
    Active,
    Restarting,
    Offline,
    Stopped,
    Deleted,
}

impl AgentRuntimeState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRuntimeState::Provisioning => "provisioning",
            AgentRuntimeState::Active => "active",
            AgentRuntimeState::Restarting => "restarting",
            AgentRuntimeState::Offline => "offline",
            AgentRuntimeState::Stopped => "stopped",
            AgentRuntimeState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AgentRuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state transition, pushed to the system of record.
///
/// Consumers must treat a repeated `(agent_id, state)` as idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub state: AgentRuntimeState,
    /// Externally reachable `host:port`, set on `active`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Diagnostic text, e.g. the runtime's log tail on `offline`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    #[must_use]
    pub fn new(agent_id: &str, user_id: Option<&str>, state: AgentRuntimeState) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            user_id: user_id.map(str::to_string),
            state,
            address: None,
            detail: None,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Escalation raised when automatic recovery gave up on an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAlert {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub host_address: String,
    pub consecutive_failures: u32,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of an agent's service on the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    /// Service-manager active state (`active`, `inactive`, `failed`, ...).
    pub status: String,
    /// Raw start timestamp reported by the service manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Resident memory of the main process, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    pub address: String,
}

impl AgentStats {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub external_address: String,
}
