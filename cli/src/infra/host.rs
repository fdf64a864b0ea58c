//! Infrastructure implementations of the `HostExecutor` port.
//!
//! Both backends run the same shell command lines, and both write files by
//! piping content into the same `mkdir -p .. && cat > ..` command, so the
//! lifecycle controller sees identical behavior whichever transport is used.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use crate::application::ports::{CommandOutput, CommandRunner, HostExecutor};
use crate::domain::config::{HostConfig, Transport};
use crate::domain::error::ExecError;
use crate::domain::shell::write_stdin_to;
use crate::infra::command_runner::TokioCommandRunner;

/// Exit status `ssh` itself uses for connection and authentication errors.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Seconds `ssh` waits for the TCP connection before giving up.
const SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

// ── Local ─────────────────────────────────────────────────────────────────────

/// Runs commands with `sh -c` on this machine.
pub struct LocalExecutor<R> {
    runner: R,
    timeout: Duration,
}

impl<R: CommandRunner> LocalExecutor<R> {
    pub fn new(runner: R, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

impl<R: CommandRunner> HostExecutor for LocalExecutor<R> {
    fn host(&self) -> &str {
        "localhost"
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        tracing::debug!(command, "local exec");
        let output = self
            .runner
            .run_with_timeout("sh", &["-c", command], self.timeout)
            .await?;
        Ok(CommandOutput::from_output(&output))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<CommandOutput, ExecError> {
        tracing::debug!(path, bytes = content.len(), "local write");
        let command = write_stdin_to(path);
        let output = self
            .runner
            .run_with_stdin("sh", &["-c", &command], content, self.timeout)
            .await?;
        Ok(CommandOutput::from_output(&output))
    }
}

// ── SSH ───────────────────────────────────────────────────────────────────────

/// Runs commands on a remote host with key-based, non-interactive `ssh`.
///
/// One connection per call; nothing is kept open between calls.
pub struct SshExecutor<R> {
    runner: R,
    address: String,
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    timeout: Duration,
}

impl<R: CommandRunner> SshExecutor<R> {
    pub fn new(
        runner: R,
        address: &str,
        user: &str,
        port: u16,
        identity_file: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            address: address.to_string(),
            user: user.to_string(),
            port,
            identity_file,
            timeout,
        }
    }

    /// Full `ssh` argument list for running `command` remotely.
    #[must_use]
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-o",
            "LogLevel=ERROR",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={SSH_CONNECT_TIMEOUT_SECS}"));
        args.push("-p".to_string());
        args.push(self.port.to_string());
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args.push(format!("{}@{}", self.user, self.address));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn interpret(&self, output: &Output) -> Result<CommandOutput, ExecError> {
        let out = CommandOutput::from_output(output);
        if out.exit_code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(ExecError::Unreachable {
                host: self.address.clone(),
                detail: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }
}

impl<R: CommandRunner> HostExecutor for SshExecutor<R> {
    fn host(&self) -> &str {
        &self.address
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        tracing::debug!(host = %self.address, command, "ssh exec");
        let args = self.ssh_args(command);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_timeout("ssh", &args, self.timeout)
            .await?;
        self.interpret(&output)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<CommandOutput, ExecError> {
        tracing::debug!(host = %self.address, path, bytes = content.len(), "ssh write");
        let args = self.ssh_args(&write_stdin_to(path));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_stdin("ssh", &args, content, self.timeout)
            .await?;
        self.interpret(&output)
    }
}

// ── Backend selection ─────────────────────────────────────────────────────────

/// The executor chosen by `host.transport`.
pub enum HostBackend {
    Local(LocalExecutor<TokioCommandRunner>),
    Ssh(SshExecutor<TokioCommandRunner>),
}

impl HostBackend {
    /// Build the executor for `config`. Config validation guarantees an
    /// address for SSH; a missing one falls back to `localhost`.
    #[must_use]
    pub fn from_config(config: &HostConfig) -> Self {
        let runner = TokioCommandRunner::new();
        match config.transport {
            Transport::Local => {
                HostBackend::Local(LocalExecutor::new(runner, config.command_timeout()))
            }
            Transport::Ssh => HostBackend::Ssh(SshExecutor::new(
                runner,
                config.address.as_deref().unwrap_or("localhost"),
                &config.user,
                config.ssh_port,
                config.identity_file.clone(),
                config.command_timeout(),
            )),
        }
    }
}

impl HostExecutor for HostBackend {
    fn host(&self) -> &str {
        match self {
            HostBackend::Local(e) => e.host(),
            HostBackend::Ssh(e) => e.host(),
        }
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        match self {
            HostBackend::Local(e) => e.execute(command).await,
            HostBackend::Ssh(e) => e.execute(command).await,
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<CommandOutput, ExecError> {
        match self {
            HostBackend::Local(e) => e.write_file(path, content).await,
            HostBackend::Ssh(e) => e.write_file(path, content).await,
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
