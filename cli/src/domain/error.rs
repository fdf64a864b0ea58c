//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Transport errors ──────────────────────────────────────────────────────────

/// The host could not be asked to do anything at all.
///
/// A command that ran and exited nonzero is NOT an `ExecError`; it comes
/// back as a normal `CommandOutput`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host {host} is unreachable: {detail}")]
    Unreachable { host: String, detail: String },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Validation errors ─────────────────────────────────────────────────────────

/// Bad input, caught before any host mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid agent id '{0}': must match ^[A-Za-z0-9_-]{{1,64}}$")]
    InvalidAgentId(String),

    #[error("config.json is not valid JSON: {0}")]
    MalformedConfig(#[from] serde_json::Error),

    #[error("config.json must contain a JSON object at the top level")]
    ConfigNotObject,

    #[error("Unsafe file path '{0}': must be relative and must not contain '..'")]
    UnsafePath(String),

    #[error("Duplicate file path '{0}' in request")]
    DuplicatePath(String),

    #[error("Invalid environment variable name '{0}'")]
    InvalidEnvKey(String),

    #[error("Environment variable '{0}' contains a line break")]
    InvalidEnvValue(String),
}

// ── Lifecycle errors ──────────────────────────────────────────────────────────

/// Failure of one lifecycle operation, with whatever diagnostics were gathered.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] ExecError),

    #[error("Agent '{agent_id}' did not reach the active state.\n\nRecent log output:\n{logs}")]
    StartFailed { agent_id: String, logs: String },

    #[error("{step} failed (exit code {}): {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        step: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Agent '{0}' has no workspace on the host. Create it first.")]
    NotFound(String),

    #[error("Port placement failed: {0}")]
    Placement(String),

    #[error("Could not lock agent: {0}")]
    Lock(String),
}

impl LifecycleError {
    /// Whether the host itself could not be reached.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, LifecycleError::Transport(_))
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to orchestrator configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("{key} is required when host.transport is '{transport}'")]
    MissingValue {
        key: &'static str,
        transport: &'static str,
    },
}
