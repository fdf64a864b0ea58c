//! Service-manager command lines and output parsers.
//!
//! Builders return a single shell command string for `HostExecutor::execute`.
//! Every interpolated value passes through [`quote`].
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.

use crate::domain::shell::quote;

// ── Command builders ──────────────────────────────────────────────────────────

#[must_use]
pub fn daemon_reload() -> String {
    "systemctl daemon-reload".to_string()
}

/// Enable at boot and (re)start now. Safe to repeat on an already running unit.
#[must_use]
pub fn enable_and_restart(service: &str) -> String {
    let svc = quote(service);
    format!("systemctl enable {svc} && systemctl restart {svc}")
}

#[must_use]
pub fn is_active(service: &str) -> String {
    format!("systemctl is-active {}", quote(service))
}

#[must_use]
pub fn stop(service: &str) -> String {
    format!("systemctl stop {}", quote(service))
}

#[must_use]
pub fn restart(service: &str) -> String {
    format!("systemctl restart {}", quote(service))
}

#[must_use]
pub fn disable(service: &str) -> String {
    format!("systemctl disable {}", quote(service))
}

#[must_use]
pub fn show(service: &str) -> String {
    format!(
        "systemctl show {} --property=LoadState,ActiveState,MainPID,ActiveEnterTimestamp",
        quote(service)
    )
}

#[must_use]
pub fn journal_tail(service: &str, lines: u32) -> String {
    format!(
        "journalctl -u {} -n {lines} --no-pager --output=cat",
        quote(service)
    )
}

#[must_use]
pub fn process_rss(pid: u32) -> String {
    format!("ps -o rss= -p {pid}")
}

#[must_use]
pub fn make_dir(path: &str) -> String {
    format!("mkdir -p {}", quote(path))
}

#[must_use]
pub fn restrict_permissions(path: &str) -> String {
    format!("chmod 600 {}", quote(path))
}

#[must_use]
pub fn dir_exists(path: &str) -> String {
    format!("test -d {}", quote(path))
}

#[must_use]
pub fn remove_file(path: &str) -> String {
    format!("rm -f {}", quote(path))
}

#[must_use]
pub fn remove_tree(path: &str) -> String {
    format!("rm -rf -- {}", quote(path))
}

// ── Parsers ──────────────────────────────────────────────────────────────────

/// First line of `systemctl is-active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Active,
    /// Starting up or reloading; keep waiting.
    Activating,
    /// Crashed or failed to start; waiting longer will not help.
    Failed,
    Inactive,
    Unknown,
}

impl ActiveState {
    #[must_use]
    pub fn is_active(self) -> bool {
        self == ActiveState::Active
    }
}

#[must_use]
pub fn parse_active_state(stdout: &str) -> ActiveState {
    match stdout.lines().next().map(str::trim) {
        Some("active") => ActiveState::Active,
        Some("activating" | "reloading" | "deactivating") => ActiveState::Activating,
        Some("failed") => ActiveState::Failed,
        Some("inactive") => ActiveState::Inactive,
        _ => ActiveState::Unknown,
    }
}

/// Properties read from `systemctl show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub active_state: String,
    pub main_pid: Option<u32>,
    pub active_since: Option<String>,
}

/// Parse `KEY=VALUE` lines from [`show`]. `None` if the unit is not loaded.
#[must_use]
pub fn parse_show(stdout: &str) -> Option<ServiceSnapshot> {
    let mut load_state = None;
    let mut active_state = None;
    let mut main_pid = None;
    let mut active_since = None;
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "LoadState" => load_state = Some(value),
            "ActiveState" => active_state = Some(value.to_string()),
            "MainPID" => main_pid = value.parse::<u32>().ok().filter(|pid| *pid != 0),
            "ActiveEnterTimestamp" if !value.is_empty() && value != "n/a" => {
                active_since = Some(value.to_string());
            }
            _ => {}
        }
    }
    match load_state {
        Some("not-found") | None => None,
        Some(_) => Some(ServiceSnapshot {
            active_state: active_state.unwrap_or_else(|| "unknown".to_string()),
            main_pid,
            active_since,
        }),
    }
}

/// Resident set size in bytes from `ps -o rss=` (which reports KiB).
#[must_use]
pub fn parse_rss_bytes(stdout: &str) -> Option<u64> {
    stdout
        .trim()
        .parse::<u64>()
        .ok()
        .map(|kib| kib.saturating_mul(1024))
}
