//! Per-agent mutual exclusion.
//!
//! Lifecycle operations on the same agent run one at a time; operations on
//! different agents never wait for each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async mutex. Entries nobody holds are pruned on the next acquire.
#[derive(Debug, Default, Clone)]
pub struct AgentLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AgentLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `agent_id`, then hold it until the
    /// guard is dropped.
    pub async fn acquire(&self, agent_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // One reference is the table's own; more means someone holds or waits.
            table.retain(|id, lock| id == agent_id || Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(agent_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of agents with a lock entry. Test-only visibility into pruning.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
