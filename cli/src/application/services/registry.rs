//! Tracked-agent registry.
//!
//! The set of agents the health monitor checks, with their in-memory failure
//! counters. Membership is persisted through a `TrackedAgentStore` so that
//! `berth track` in one process is seen by `berth monitor` in another.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use crate::application::ports::TrackedAgentStore;
use crate::domain::health::{CheckVerdict, TrackedAgent};

pub struct AgentRegistry<S> {
    store: S,
    agents: Mutex<BTreeMap<String, TrackedAgent>>,
}

impl<S: TrackedAgentStore> AgentRegistry<S> {
    /// Open the registry with whatever the store currently holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load(store: S) -> Result<Self> {
        let agents = store
            .load()
            .await?
            .into_iter()
            .map(|a| (a.agent_id.clone(), a))
            .collect();
        Ok(Self {
            store,
            agents: Mutex::new(agents),
        })
    }

    /// Start watching an agent. Re-tracking keeps its failure counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn track(&self, agent: TrackedAgent) -> Result<()> {
        let (_, stored) = self
            .store
            .update(move |agents| {
                agents.retain(|a| a.agent_id != agent.agent_id);
                agents.push(agent);
                agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
                true
            })
            .await?;
        self.replace(stored);
        Ok(())
    }

    /// Stop watching an agent. Returns whether it was tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn untrack(&self, agent_id: &str) -> Result<bool> {
        let id = agent_id.to_string();
        let (removed, stored) = self
            .store
            .update(move |agents| {
                let before = agents.len();
                agents.retain(|a| a.agent_id != id);
                agents.len() != before
            })
            .await?;
        self.replace(stored);
        Ok(removed)
    }

    /// Re-read membership from the store, keeping counters of agents that
    /// are still tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn sync(&self) -> Result<()> {
        let stored = self.store.load().await?;
        self.replace(stored);
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<TrackedAgent> {
        self.lock().values().cloned().collect()
    }

    /// Owner recorded at track time; `None` if untracked or ownerless.
    #[must_use]
    pub fn user_of(&self, agent_id: &str) -> Option<String> {
        self.lock()
            .get(agent_id)
            .map(|a| a.user_id.clone())
            .filter(|u| !u.is_empty())
    }

    pub fn record_success(&self, agent_id: &str) {
        if let Some(agent) = self.lock().get_mut(agent_id) {
            agent.record_success();
        }
    }

    /// Count a failed check. `None` if the agent was untracked meanwhile.
    pub fn record_failure(&self, agent_id: &str, max_failures: u32) -> Option<CheckVerdict> {
        self.lock()
            .get_mut(agent_id)
            .map(|agent| agent.record_failure(max_failures))
    }

    pub fn reset(&self, agent_id: &str) {
        if let Some(agent) = self.lock().get_mut(agent_id) {
            agent.reset();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, TrackedAgent>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt `stored` as the membership, carrying over known counters.
    fn replace(&self, stored: Vec<TrackedAgent>) {
        let mut agents = self.lock();
        let next = stored
            .into_iter()
            .map(|mut a| {
                a.consecutive_failures = agents
                    .get(&a.agent_id)
                    .map_or(0, |known| known.consecutive_failures);
                (a.agent_id.clone(), a)
            })
            .collect();
        *agents = next;
    }
}
