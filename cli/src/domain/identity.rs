//! Host placement: everything an agent owns on the host, derived from its id.
//!
//! Pure functions only. The same id and placement config always yield the
//! same identity, so nothing here needs to be persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::config::PlacementConfig;
use crate::domain::error::ValidationError;

/// Agent ids reach shell commands and paths; keep them to a safe alphabet.
pub static AGENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern; cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex")
});

/// Name of the workspace subdirectory inside the state directory.
pub const WORKSPACE_DIR: &str = "workspace";
/// Structured runtime config, at the state-directory root.
pub const CONFIG_FILE: &str = "config.json";
/// Environment file, at the state-directory root.
pub const ENV_FILE: &str = ".env";

/// Host-level names, paths and port of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub service_name: String,
    pub profile_name: String,
    pub state_dir: String,
    pub port: u16,
}

impl AgentIdentity {
    #[must_use]
    pub fn workspace_dir(&self) -> String {
        format!("{}/{WORKSPACE_DIR}", self.state_dir)
    }

    #[must_use]
    pub fn config_path(&self) -> String {
        format!("{}/{CONFIG_FILE}", self.state_dir)
    }

    #[must_use]
    pub fn env_path(&self) -> String {
        format!("{}/{ENV_FILE}", self.state_dir)
    }

    #[must_use]
    pub fn unit_path(&self, placement: &PlacementConfig) -> String {
        format!(
            "{}/{}.service",
            placement.unit_dir.trim_end_matches('/'),
            self.service_name
        )
    }

    /// `host:port` under which users reach the agent.
    #[must_use]
    pub fn external_address(&self, public_host: &str) -> String {
        format!("{public_host}:{}", self.port)
    }

    /// Same identity with the port taken from the reservation table.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Validates an agent id before it is interpolated anywhere.
///
/// # Errors
///
/// Returns `ValidationError::InvalidAgentId` if the id is empty, too long or
/// contains characters outside `[A-Za-z0-9_-]`.
pub fn validate_agent_id(agent_id: &str) -> Result<(), ValidationError> {
    if AGENT_ID_RE.is_match(agent_id) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAgentId(agent_id.to_string()))
    }
}

/// Derive the identity of `agent_id`. Total and deterministic.
#[must_use]
pub fn resolve(agent_id: &str, placement: &PlacementConfig) -> AgentIdentity {
    let profile_name = format!("{}{agent_id}", placement.profile_prefix);
    AgentIdentity {
        agent_id: agent_id.to_string(),
        service_name: format!("{}{agent_id}", placement.service_prefix),
        state_dir: format!(
            "{}/{profile_name}",
            placement.state_root.trim_end_matches('/')
        ),
        profile_name,
        port: preferred_port(agent_id, placement),
    }
}

/// `base_port + fnv1a(agent_id) mod port_range`.
#[must_use]
pub fn preferred_port(agent_id: &str, placement: &PlacementConfig) -> u16 {
    port_at(placement, hash_offset(agent_id, placement))
}

/// Pick a port for `agent_id` given the current reservation table.
///
/// An existing in-range reservation is returned unchanged. Otherwise probe
/// linearly from the preferred port, wrapping inside the range, for a port no
/// other agent holds. `None` when every port in the range is taken.
#[must_use]
pub fn allocate_port(
    agent_id: &str,
    placement: &PlacementConfig,
    reservations: &BTreeMap<String, u16>,
) -> Option<u16> {
    if let Some(&port) = reservations.get(agent_id)
        && in_range(port, placement)
    {
        return Some(port);
    }
    let taken: BTreeSet<u16> = reservations
        .iter()
        .filter(|(id, _)| id.as_str() != agent_id)
        .map(|(_, port)| *port)
        .collect();
    let range = u32::from(placement.port_range.max(1));
    let start = hash_offset(agent_id, placement);
    (0..range)
        .map(|step| port_at(placement, (start + step) % range))
        .find(|port| !taken.contains(port))
}

fn in_range(port: u16, placement: &PlacementConfig) -> bool {
    let port = u32::from(port);
    let base = u32::from(placement.base_port);
    port >= base && port < base + u32::from(placement.port_range)
}

fn hash_offset(agent_id: &str, placement: &PlacementConfig) -> u32 {
    fnv1a(agent_id.as_bytes()) % u32::from(placement.port_range.max(1))
}

fn port_at(placement: &PlacementConfig, offset: u32) -> u16 {
    // base_port + port_range <= 65536 is enforced by config validation.
    u16::try_from(u32::from(placement.base_port) + offset).unwrap_or(u16::MAX)
}

/// 32-bit FNV-1a. Stable across builds and platforms, unlike `DefaultHasher`.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(PRIME)
    })
}
