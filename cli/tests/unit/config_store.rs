//! `YamlConfigStore` loading and the `BERTH_CONFIG` override.
//!
//! These tests mutate `BERTH_CONFIG` and are serialized with `#[serial]`.

#![allow(clippy::unwrap_used, unsafe_code)]

use berth_cli::application::ports::ConfigStore;
use berth_cli::domain::config::Transport;
use berth_cli::infra::config::{CONFIG_ENV, YamlConfigStore};
use serial_test::serial;
use tempfile::TempDir;

fn point_at(content: Option<&str>) -> TempDir {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    if let Some(content) = content {
        std::fs::write(&path, content).unwrap();
    }
    // SAFETY: every test touching the variable is #[serial].
    unsafe { std::env::set_var(CONFIG_ENV, &path) };
    dir
}

fn clear() {
    // SAFETY: every test touching the variable is #[serial].
    unsafe { std::env::remove_var(CONFIG_ENV) };
}

#[test]
#[serial]
fn env_override_sets_path() {
    let dir = point_at(None);
    assert_eq!(
        YamlConfigStore.path().unwrap(),
        dir.path().join("config.yaml")
    );
    clear();
}

#[test]
#[serial]
fn missing_file_yields_defaults() {
    let _dir = point_at(None);
    let config = YamlConfigStore.load().unwrap();
    assert_eq!(config.host.transport, Transport::Local);
    assert_eq!(config.placement.base_port, 19000);
    assert_eq!(config.placement.port_range, 1000);
    assert_eq!(config.monitor.max_failures, 3);
    assert_eq!(config.monitor.interval_secs, 60);
    clear();
}

#[test]
#[serial]
fn partial_file_keeps_other_defaults() {
    let _dir = point_at(Some(
        "host:\n  transport: ssh\n  address: 10.0.0.5\nmonitor:\n  max_failures: 5\n",
    ));
    let config = YamlConfigStore.load().unwrap();
    assert_eq!(config.host.transport, Transport::Ssh);
    assert_eq!(config.host.address.as_deref(), Some("10.0.0.5"));
    assert_eq!(config.host.user, "root");
    assert_eq!(config.monitor.max_failures, 5);
    assert_eq!(config.monitor.interval_secs, 60);
    assert_eq!(config.host.public_host(), "10.0.0.5");
    clear();
}

#[test]
#[serial]
fn ssh_without_address_is_rejected() {
    let _dir = point_at(Some("host:\n  transport: ssh\n"));
    let err = YamlConfigStore.load().unwrap_err();
    assert!(format!("{err:#}").contains("host.address"), "{err:#}");
    clear();
}

#[test]
#[serial]
fn port_range_past_65535_is_rejected() {
    let _dir = point_at(Some("placement:\n  base_port: 65000\n  port_range: 1000\n"));
    let err = YamlConfigStore.load().unwrap_err();
    assert!(format!("{err:#}").contains("placement.port_range"), "{err:#}");
    clear();
}

#[test]
#[serial]
fn unparseable_yaml_names_the_file() {
    let _dir = point_at(Some("host: [unterminated\n"));
    let err = YamlConfigStore.load().unwrap_err();
    assert!(format!("{err:#}").contains("config.yaml"), "{err:#}");
    clear();
}
