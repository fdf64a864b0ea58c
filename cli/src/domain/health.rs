//! Health-check bookkeeping for tracked agents.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────────

/// An agent the health monitor watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAgent {
    pub agent_id: String,
    pub user_id: String,
    /// Host the agent was placed on, reported in offline alerts.
    pub host_address: String,
    /// Consecutive failed checks. Runtime-only; a fresh process starts at 0.
    #[serde(skip)]
    pub consecutive_failures: u32,
}

/// What a check result means for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckVerdict {
    Healthy,
    /// Failed, but below the restart threshold.
    Degraded { failures: u32 },
    /// Threshold reached; the monitor should restart once.
    RestartDue,
}

// ── Pure functions ────────────────────────────────────────────────────────────

impl TrackedAgent {
    #[must_use]
    pub fn new(agent_id: &str, user_id: &str, host_address: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            user_id: user_id.to_string(),
            host_address: host_address.to_string(),
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) -> CheckVerdict {
        self.consecutive_failures = 0;
        CheckVerdict::Healthy
    }

    /// Count one failed check against a threshold of `max_failures`.
    pub fn record_failure(&mut self, max_failures: u32) -> CheckVerdict {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= max_failures.max(1) {
            CheckVerdict::RestartDue
        } else {
            CheckVerdict::Degraded {
                failures: self.consecutive_failures,
            }
        }
    }

    /// Start counting again after a restart attempt, successful or not.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
