//! JSON-file implementations of the `PortReservations` and
//! `TrackedAgentStore` ports, plus the per-agent lock files.
//!
//! Everything lives in the data directory (`~/.berth` by default), which every
//! `berth` process on the machine shares. A change is a read-modify-write held
//! under an exclusive advisory lock on `<file>.lock`, and the new content
//! replaces the old through a uniquely named temp file and a rename, so
//! concurrent processes never lose each other's updates and a crash never
//! leaves a half-written file.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{PortReservations, SharedAgentLocks, TrackedAgentStore};
use crate::domain::config::PlacementConfig;
use crate::domain::health::TrackedAgent;
use crate::domain::identity::allocate_port;

/// Port reservation table file name inside the data directory.
pub const PORTS_FILE: &str = "ports.json";
/// Tracked-agent registry file name inside the data directory.
pub const TRACKED_FILE: &str = "tracked.json";
/// Per-agent lock files, inside the data directory.
pub const LOCKS_DIR: &str = "locks";

/// Default data directory, `~/.berth`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".berth"))
}

// ── File helpers ──────────────────────────────────────────────────────────────

/// Open (creating if needed) `path` and block until this handle holds an
/// exclusive lock on it. The lock is released when the file is dropped.
fn lock_sync(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("opening lock file {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("locking {}", path.display()))?;
    Ok(file)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn load_sync<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("parsing state file {}", path.display()))
}

fn save_sync<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state file {} has no parent directory", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;
    let content = serde_json::to_string_pretty(value).context("serializing state")?;

    // Created 0600 with a unique name, in the target's directory so the
    // rename stays on one filesystem.
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    std::io::Write::write_all(&mut temp, content.as_bytes())
        .with_context(|| format!("writing temp file {}", temp.path().display()))?;
    temp.persist(path)
        .with_context(|| format!("finalizing state file {}", path.display()))?;
    Ok(())
}

/// Load, apply `change`, and save if it reports a change, all while holding
/// the file's lock. Returns whether anything was written and the new value.
fn update_sync<T, F>(path: &Path, change: F) -> Result<(bool, T)>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> Result<bool>,
{
    let _lock = lock_sync(&lock_path(path))?;
    let mut value: T = load_sync(path)?;
    let changed = change(&mut value)?;
    if changed {
        save_sync(path, &value)?;
    }
    Ok((changed, value))
}

async fn load_async<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default + Send + 'static,
{
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_sync(&path))
        .await
        .context("state load task panicked")?
}

async fn update_async<T, F>(path: &Path, change: F) -> Result<(bool, T)>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
    F: FnOnce(&mut T) -> Result<bool> + Send + 'static,
{
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || update_sync(&path, change))
        .await
        .context("state update task panicked")?
}

// ── Port reservations ─────────────────────────────────────────────────────────

/// `agent id -> port`, persisted as a JSON object.
pub struct JsonPortReservations {
    path: PathBuf,
}

impl JsonPortReservations {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(PORTS_FILE))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Whole table, for display.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn all(&self) -> Result<BTreeMap<String, u16>> {
        load_async(&self.path).await
    }
}

impl PortReservations for JsonPortReservations {
    async fn reserve(&self, agent_id: &str, placement: &PlacementConfig) -> Result<u16> {
        let id = agent_id.to_string();
        let placement = placement.clone();
        let (changed, table) = update_async(&self.path, move |table: &mut BTreeMap<String, u16>| {
            let port = allocate_port(&id, &placement, table).ok_or_else(|| {
                anyhow::anyhow!(
                    "no free port in {}..{}",
                    placement.base_port,
                    u32::from(placement.base_port) + u32::from(placement.port_range)
                )
            })?;
            Ok(table.insert(id, port) != Some(port))
        })
        .await?;
        let port = table
            .get(agent_id)
            .copied()
            .with_context(|| format!("reservation for {agent_id} missing after update"))?;
        if changed {
            tracing::debug!(agent_id, port, "port reserved");
        }
        Ok(port)
    }

    async fn lookup(&self, agent_id: &str) -> Result<Option<u16>> {
        let table: BTreeMap<String, u16> = load_async(&self.path).await?;
        Ok(table.get(agent_id).copied())
    }

    async fn release(&self, agent_id: &str) -> Result<()> {
        let id = agent_id.to_string();
        let (changed, _): (bool, BTreeMap<String, u16>) =
            update_async(&self.path, move |table: &mut BTreeMap<String, u16>| {
                Ok(table.remove(&id).is_some())
            })
            .await?;
        if changed {
            tracing::debug!(agent_id, "port released");
        }
        Ok(())
    }
}

// ── Tracked agents ────────────────────────────────────────────────────────────

/// Tracked-agent membership, persisted as a JSON array.
pub struct JsonTrackedStore {
    path: PathBuf,
}

impl JsonTrackedStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(TRACKED_FILE))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TrackedAgentStore for JsonTrackedStore {
    async fn load(&self) -> Result<Vec<TrackedAgent>> {
        load_async(&self.path).await
    }

    async fn update<F>(&self, change: F) -> Result<(bool, Vec<TrackedAgent>)>
    where
        F: FnOnce(&mut Vec<TrackedAgent>) -> bool + Send + 'static,
    {
        update_async(&self.path, move |agents: &mut Vec<TrackedAgent>| Ok(change(agents))).await
    }
}

// ── Agent locks ───────────────────────────────────────────────────────────────

/// One lock file per agent under `<data_dir>/locks`.
pub struct FileAgentLocks {
    dir: PathBuf,
}

/// Holds an agent's lock file open, and with it the lock.
#[derive(Debug)]
pub struct AgentLockFile {
    _file: File,
}

impl FileAgentLocks {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(LOCKS_DIR),
        }
    }
}

impl SharedAgentLocks for FileAgentLocks {
    type Guard = AgentLockFile;

    async fn lock(&self, agent_id: &str) -> Result<AgentLockFile> {
        let path = self.dir.join(format!("{agent_id}.lock"));
        let file = tokio::task::spawn_blocking(move || lock_sync(&path))
            .await
            .context("agent lock task panicked")??;
        tracing::trace!(agent_id, "agent lock held");
        Ok(AgentLockFile { _file: file })
    }
}
