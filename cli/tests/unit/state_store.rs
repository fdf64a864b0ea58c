//! JSON-file port table and tracked-agent store.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::time::Duration;

use berth_cli::application::ports::{PortReservations, SharedAgentLocks, TrackedAgentStore};
use berth_cli::application::services::registry::AgentRegistry;
use berth_cli::domain::config::PlacementConfig;
use berth_cli::domain::health::TrackedAgent;
use berth_cli::infra::state::{
    FileAgentLocks, JsonPortReservations, JsonTrackedStore, PORTS_FILE, TRACKED_FILE,
};

/// Run `work` on its own thread and runtime, the way a separate `berth`
/// process would.
fn in_own_runtime<T, F>(work: impl FnOnce() -> F + Send + 'static) -> std::thread::JoinHandle<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = T>,
{
    std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(work())
    })
}

fn small_range() -> PlacementConfig {
    PlacementConfig {
        base_port: 20000,
        port_range: 3,
        ..PlacementConfig::default()
    }
}

#[tokio::test]
async fn missing_files_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let ports = JsonPortReservations::new(dir.path());
    assert!(ports.all().await.unwrap().is_empty());
    assert_eq!(ports.lookup("a1").await.unwrap(), None);
    assert!(JsonTrackedStore::new(dir.path()).load().await.unwrap().is_empty());
}

#[tokio::test]
async fn reserve_is_stable_and_distinct_per_agent() {
    let dir = tempfile::tempdir().unwrap();
    let ports = JsonPortReservations::new(dir.path());
    let placement = small_range();

    let a = ports.reserve("a", &placement).await.unwrap();
    let b = ports.reserve("b", &placement).await.unwrap();
    let c = ports.reserve("c", &placement).await.unwrap();
    assert_eq!(ports.reserve("a", &placement).await.unwrap(), a);

    let mut all = vec![a, b, c];
    all.sort_unstable();
    assert_eq!(all, vec![20000, 20001, 20002]);

    let err = ports.reserve("d", &placement).await.unwrap_err();
    assert!(err.to_string().contains("no free port"), "{err}");
}

#[tokio::test]
async fn release_frees_the_port_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ports = JsonPortReservations::new(dir.path());
    let placement = PlacementConfig {
        port_range: 1,
        ..small_range()
    };

    ports.reserve("a", &placement).await.unwrap();
    ports.release("a").await.unwrap();
    ports.release("a").await.unwrap();
    assert_eq!(ports.reserve("b", &placement).await.unwrap(), 20000);
}

#[tokio::test]
async fn reservations_survive_a_new_handle() {
    let dir = tempfile::tempdir().unwrap();
    let port = JsonPortReservations::new(dir.path())
        .reserve("a", &small_range())
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join(PORTS_FILE)).unwrap();
    let table: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(table["a"], port);

    let reopened = JsonPortReservations::new(dir.path());
    assert_eq!(reopened.lookup("a").await.unwrap(), Some(port));
}

#[cfg(unix)]
#[tokio::test]
async fn state_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    JsonPortReservations::new(dir.path())
        .reserve("a", &small_range())
        .await
        .unwrap();
    let mode = std::fs::metadata(dir.path().join(PORTS_FILE))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn tracked_store_round_trips_membership_without_counters() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonTrackedStore::new(dir.path());
    let mut agent = TrackedAgent::new("a1", "u1", "10.0.0.5");
    agent.consecutive_failures = 2;

    store
        .update(move |agents| {
            agents.push(agent);
            true
        })
        .await
        .unwrap();
    let raw = std::fs::read_to_string(dir.path().join(TRACKED_FILE)).unwrap();
    assert!(raw.contains("\"hostAddress\""));
    assert!(!raw.contains("consecutive"));

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded, vec![TrackedAgent::new("a1", "u1", "10.0.0.5")]);
}

#[tokio::test]
async fn corrupt_state_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PORTS_FILE), "{oops").unwrap();
    let err = JsonPortReservations::new(dir.path())
        .lookup("a")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("parsing state file"), "{err:#}");
}

#[test]
fn concurrent_tables_on_one_file_keep_every_reservation() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join(PORTS_FILE);

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let path = path.clone();
            in_own_runtime(move || async move {
                JsonPortReservations::with_path(path)
                    .reserve(&format!("agent{i}"), &PlacementConfig::default())
                    .await
                    .unwrap()
            })
        })
        .collect();
    let mut ports: Vec<u16> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let table = tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(JsonPortReservations::with_path(path).all())
        .unwrap();
    assert_eq!(table.len(), 8, "{table:?}");
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), 8, "two agents share a port: {table:?}");
}

#[test]
fn concurrent_registries_on_one_file_keep_every_agent() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_path_buf();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let data_dir = data_dir.clone();
            in_own_runtime(move || async move {
                let registry = AgentRegistry::load(JsonTrackedStore::new(&data_dir))
                    .await
                    .unwrap();
                registry
                    .track(TrackedAgent::new(&format!("agent{i}"), "u1", "10.0.0.5"))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stored = tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(JsonTrackedStore::new(&data_dir).load())
        .unwrap();
    assert_eq!(stored.len(), 8, "{stored:?}");
}

#[tokio::test]
async fn agent_lock_file_excludes_a_second_holder() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileAgentLocks::new(dir.path());
    let second = FileAgentLocks::new(dir.path());

    let held = first.lock("a1").await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(100), second.lock("a1")).await;
    assert!(blocked.is_err(), "second holder got the lock");

    let other = tokio::time::timeout(Duration::from_millis(500), second.lock("a2")).await;
    assert!(other.is_ok(), "different agents must not block");

    drop(held);
    let again = tokio::time::timeout(Duration::from_secs(2), second.lock("a1")).await;
    assert!(again.unwrap().is_ok());
}
