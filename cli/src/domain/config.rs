//! Domain types and validators for Berth configuration.
//!
//! Nothing here reads the file; see `infra::config` for loading.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.berth/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BerthConfig {
    /// The host agents are placed on.
    pub host: HostConfig,
    /// Naming, directories and port range.
    pub placement: PlacementConfig,
    /// How the agent runtime binary is launched.
    pub runtime: RuntimeConfig,
    /// Readiness wait after start/restart.
    pub readiness: ReadinessConfig,
    /// Health monitor cadence and threshold.
    pub monitor: MonitorConfig,
    /// Where state transitions are pushed.
    pub reporter: ReporterConfig,
    /// Local directory for the port reservation table and tracked agents.
    /// Defaults to `~/.berth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// How commands reach the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Agents run on the same machine as the orchestrator.
    #[default]
    Local,
    /// Agents run on a remote machine reached over SSH with a key.
    Ssh,
}

impl Transport {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Local => "local",
            Transport::Ssh => "ssh",
        }
    }
}

/// Host connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub transport: Transport,
    /// SSH host name or IP. Required for `ssh`.
    pub address: Option<String>,
    pub user: String,
    pub ssh_port: u16,
    /// Private key used for SSH authentication.
    pub identity_file: Option<PathBuf>,
    /// Host name reported to users as `host:port`. Falls back to `address`,
    /// then `127.0.0.1`.
    pub public_address: Option<String>,
    pub command_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Local,
            address: None,
            user: "root".to_string(),
            ssh_port: 22,
            identity_file: None,
            public_address: None,
            command_timeout_secs: 60,
        }
    }
}

impl HostConfig {
    /// Host part of every externally reachable agent address.
    #[must_use]
    pub fn public_host(&self) -> String {
        self.public_address
            .clone()
            .or_else(|| self.address.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Deterministic naming and port range for agents on the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlacementConfig {
    pub service_prefix: String,
    pub profile_prefix: String,
    /// Parent of every per-agent state directory.
    pub state_root: String,
    /// Where service-unit descriptions are registered.
    pub unit_dir: String,
    pub base_port: u16,
    pub port_range: u16,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            service_prefix: "berth-agent-".to_string(),
            profile_prefix: "agent-".to_string(),
            state_root: "/var/lib/berth".to_string(),
            unit_dir: "/etc/systemd/system".to_string(),
            base_port: 19000,
            port_range: 1000,
        }
    }
}

/// Launch settings for the agent runtime binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the runtime. `{version}` expands to the requested version.
    pub binary: String,
    /// Arguments. `{profile}`, `{port}`, `{state_dir}` and `{workspace}` expand
    /// to the agent's identity.
    pub args: Vec<String>,
    /// Optional `User=` for the service unit.
    pub user: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "/usr/local/bin/agent-runtime".to_string(),
            args: vec![
                "--profile".to_string(),
                "{profile}".to_string(),
                "gateway".to_string(),
                "--port".to_string(),
                "{port}".to_string(),
            ],
            user: None,
        }
    }
}

/// Bounded exponential-backoff readiness poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Wait before the first `is-active` query.
    pub initial_delay_ms: u64,
    /// Cap on the doubling poll interval.
    pub max_interval_ms: u64,
    /// Give up (and report offline) after this long.
    pub max_wait_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_interval_ms: 4000,
            max_wait_secs: 20,
        }
    }
}

impl ReadinessConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Health monitor settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    /// Consecutive failed checks that trigger an automatic restart.
    pub max_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_failures: 3,
        }
    }
}

/// Status reporter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReporterConfig {
    /// System-of-record endpoint. Events are only logged when unset.
    pub webhook_url: Option<String>,
    /// Environment variable holding the bearer token for the webhook.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            token_env: "BERTH_REPORTER_TOKEN".to_string(),
            timeout_secs: 10,
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

impl BerthConfig {
    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let placement = &self.placement;
        if placement.port_range == 0 {
            return Err(ConfigError::InvalidValue {
                key: "placement.port_range",
                reason: "must be greater than 0".to_string(),
            });
        }
        if u32::from(placement.base_port) + u32::from(placement.port_range) > 65536 {
            return Err(ConfigError::InvalidValue {
                key: "placement.port_range",
                reason: format!(
                    "base_port {} + port_range {} exceeds 65535",
                    placement.base_port, placement.port_range
                ),
            });
        }
        if !placement.state_root.starts_with('/') || placement.state_root.trim_matches('/').is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: "placement.state_root",
                reason: "must be an absolute path other than /".to_string(),
            });
        }
        if !placement.unit_dir.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "placement.unit_dir",
                reason: "must be an absolute path".to_string(),
            });
        }
        if self.monitor.max_failures == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.max_failures",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.host.transport == Transport::Ssh
            && self.host.address.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingValue {
                key: "host.address",
                transport: Transport::Ssh.as_str(),
            });
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
