//! Shared test doubles for application service tests.
//!
//! Every double is `Clone` over shared state so a test can hand one to a
//! service and still inspect what it recorded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use berth_common::{AgentRuntimeState, OfflineAlert, StatusEvent};

use crate::application::ports::{
    CommandOutput, HostExecutor, PortReservations, SharedAgentLocks, StatusReporter,
    TrackedAgentStore,
};
use crate::domain::config::PlacementConfig;
use crate::domain::error::ExecError;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::allocate_port;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn output(stdout: &str, code: i32) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(code),
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply {
    Out(CommandOutput),
    Unreachable,
}

#[derive(Default)]
struct HostState {
    commands: Vec<String>,
    files: BTreeMap<String, String>,
    /// First rule whose pattern is a substring of the command wins. A rule
    /// with several replies pops one per call and repeats its last.
    rules: Vec<(String, VecDeque<Reply>)>,
    unreachable: bool,
}

/// Scriptable host. Unscripted commands succeed with empty output.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `stdout` / `code`.
    pub fn on(&self, pattern: &str, stdout: &str, code: i32) -> &Self {
        self.on_sequence(pattern, &[(stdout, code)])
    }

    /// Answer successive matching commands with `replies` in order.
    pub fn on_sequence(&self, pattern: &str, replies: &[(&str, i32)]) -> &Self {
        let replies = replies
            .iter()
            .map(|(stdout, code)| Reply::Out(output(stdout, *code)))
            .collect();
        lock(&self.state).rules.push((pattern.to_string(), replies));
        self
    }

    /// Fail commands containing `pattern` with a transport error.
    pub fn unreachable_on(&self, pattern: &str) -> &Self {
        lock(&self.state)
            .rules
            .push((pattern.to_string(), VecDeque::from([Reply::Unreachable])));
        self
    }

    /// Fail every call with a transport error.
    pub fn go_offline(&self) {
        lock(&self.state).unreachable = true;
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    pub fn ran(&self, fragment: &str) -> bool {
        self.commands().iter().any(|c| c.contains(fragment))
    }

    pub fn count(&self, fragment: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.contains(fragment))
            .count()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).cloned()
    }

    pub fn files(&self) -> BTreeMap<String, String> {
        lock(&self.state).files.clone()
    }

    fn unreachable() -> ExecError {
        ExecError::Unreachable {
            host: "fake".to_string(),
            detail: "Connection refused".to_string(),
        }
    }
}

impl HostExecutor for FakeHost {
    fn host(&self) -> &str {
        "fake"
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let mut state = lock(&self.state);
        if state.unreachable {
            return Err(Self::unreachable());
        }
        state.commands.push(command.to_string());
        let reply = state
            .rules
            .iter_mut()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .and_then(|(_, replies)| {
                if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                }
            });
        match reply {
            Some(Reply::Out(out)) => Ok(out),
            Some(Reply::Unreachable) => Err(Self::unreachable()),
            None => Ok(output("", 0)),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<CommandOutput, ExecError> {
        let mut state = lock(&self.state);
        if state.unreachable {
            return Err(Self::unreachable());
        }
        state
            .files
            .insert(path.to_string(), String::from_utf8_lossy(content).into_owned());
        Ok(output("", 0))
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<StatusEvent>>>,
    alerts: Arc<Mutex<Vec<OfflineAlert>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<StatusEvent> {
        lock(&self.events).clone()
    }

    pub fn states(&self) -> Vec<AgentRuntimeState> {
        self.events().iter().map(|e| e.state).collect()
    }

    pub fn alerts(&self) -> Vec<OfflineAlert> {
        lock(&self.alerts).clone()
    }
}

impl StatusReporter for RecordingReporter {
    async fn notify(&self, event: StatusEvent) {
        lock(&self.events).push(event);
    }

    async fn alert(&self, alert: OfflineAlert) {
        lock(&self.alerts).push(alert);
    }
}

// ── State stores ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryReservations {
    table: Arc<Mutex<BTreeMap<String, u16>>>,
}

impl MemoryReservations {
    pub fn get(&self, agent_id: &str) -> Option<u16> {
        lock(&self.table).get(agent_id).copied()
    }

    pub fn insert(&self, agent_id: &str, port: u16) {
        lock(&self.table).insert(agent_id.to_string(), port);
    }
}

impl PortReservations for MemoryReservations {
    async fn reserve(&self, agent_id: &str, placement: &PlacementConfig) -> Result<u16> {
        let mut table = lock(&self.table);
        let port = allocate_port(agent_id, placement, &table)
            .ok_or_else(|| anyhow::anyhow!("port range exhausted"))?;
        table.insert(agent_id.to_string(), port);
        Ok(port)
    }

    async fn lookup(&self, agent_id: &str) -> Result<Option<u16>> {
        Ok(self.get(agent_id))
    }

    async fn release(&self, agent_id: &str) -> Result<()> {
        lock(&self.table).remove(agent_id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryTrackedStore {
    agents: Arc<Mutex<Vec<TrackedAgent>>>,
}

impl MemoryTrackedStore {
    pub fn ids(&self) -> Vec<String> {
        lock(&self.agents)
            .iter()
            .map(|a| a.agent_id.clone())
            .collect()
    }

    pub fn set(&self, agents: Vec<TrackedAgent>) {
        *lock(&self.agents) = agents;
    }
}

impl TrackedAgentStore for MemoryTrackedStore {
    async fn load(&self) -> Result<Vec<TrackedAgent>> {
        Ok(lock(&self.agents).clone())
    }

    async fn update<F>(&self, change: F) -> Result<(bool, Vec<TrackedAgent>)>
    where
        F: FnOnce(&mut Vec<TrackedAgent>) -> bool + Send + 'static,
    {
        let mut agents = lock(&self.agents);
        let changed = change(&mut *agents);
        Ok((changed, agents.clone()))
    }
}

/// Shared locks for a single process, where the controller's own per-agent
/// mutex already excludes everything.
#[derive(Clone, Copy, Default)]
pub struct NoSharedLocks;

impl SharedAgentLocks for NoSharedLocks {
    type Guard = ();

    async fn lock(&self, _agent_id: &str) -> Result<()> {
        Ok(())
    }
}
