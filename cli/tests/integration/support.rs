//! Sandboxed invocations of the `berth` binary.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A temp directory holding `config.yaml` whose `data_dir` is the directory
/// itself.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Sandbox whose config is `extra` followed by the `data_dir` line.
    pub fn with_config(extra: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = format!("{extra}data_dir: {}\n", dir.path().display());
        std::fs::write(dir.path().join("config.yaml"), config).expect("write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// Write `content` to `name` inside the sandbox and return its path.
    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn berth(&self) -> Command {
        let mut cmd = berth();
        cmd.env("BERTH_CONFIG", self.config_path());
        cmd
    }
}

/// The binary with colors off and no inherited log filter.
pub fn berth() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("berth"));
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// Parse stdout of a finished `--json` invocation.
pub fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
