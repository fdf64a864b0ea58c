//! Service-unit generation: pure functions, no I/O, no async.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.

#![allow(clippy::format_push_string)]

use crate::domain::config::RuntimeConfig;
use crate::domain::identity::AgentIdentity;
use crate::domain::shell::quote;

/// Seconds the service manager waits before restarting a crashed runtime.
pub const RESTART_SEC: u32 = 5;

/// Expand `{profile}`, `{port}`, `{state_dir}`, `{workspace}` and `{version}`.
#[must_use]
pub fn expand(template: &str, identity: &AgentIdentity, runtime_version: &str) -> String {
    template
        .replace("{profile}", &identity.profile_name)
        .replace("{port}", &identity.port.to_string())
        .replace("{state_dir}", &identity.state_dir)
        .replace("{workspace}", &identity.workspace_dir())
        .replace("{version}", runtime_version)
}

/// `ExecStart=` value: the runtime binary and its expanded, quoted arguments.
#[must_use]
pub fn exec_start(runtime: &RuntimeConfig, identity: &AgentIdentity, runtime_version: &str) -> String {
    std::iter::once(&runtime.binary)
        .chain(&runtime.args)
        .map(|word| quote(&expand(word, identity, runtime_version)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate `<service>.service` content.
///
/// The unit loads the agent's env file, runs the runtime in its state
/// directory and is restarted by the service manager whenever it exits.
#[must_use]
pub fn service_unit(
    identity: &AgentIdentity,
    runtime: &RuntimeConfig,
    runtime_version: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Generated by berth - DO NOT EDIT\n");
    out.push_str("[Unit]\n");
    out.push_str(&format!(
        "Description=Berth agent {} (runtime {runtime_version})\n",
        identity.agent_id
    ));
    out.push_str("After=network-online.target\n");
    out.push_str("Wants=network-online.target\n");
    out.push('\n');

    out.push_str("[Service]\n");
    out.push_str("Type=simple\n");
    if let Some(user) = runtime.user.as_deref().filter(|u| !u.is_empty()) {
        out.push_str(&format!("User={user}\n"));
    }
    out.push_str(&format!("WorkingDirectory={}\n", identity.state_dir));
    out.push_str(&format!("EnvironmentFile={}\n", identity.env_path()));
    out.push_str(&format!(
        "ExecStart={}\n",
        exec_start(runtime, identity, runtime_version)
    ));
    out.push_str("Restart=always\n");
    out.push_str(&format!("RestartSec={RESTART_SEC}\n"));
    out.push_str("StandardOutput=journal\n");
    out.push_str("StandardError=journal\n");
    out.push_str(&format!("SyslogIdentifier={}\n", identity.service_name));
    out.push('\n');

    out.push_str("[Install]\n");
    out.push_str("WantedBy=multi-user.target\n");
    out
}
