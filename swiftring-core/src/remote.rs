use crate::errors::{Result, RingError};

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Prefix applied to privileged remote commands.
pub const SUDO: &str = "sudo -n";

/// Raw result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands on cluster nodes.
#[async_trait]
pub trait RemoteExecutor: Send + Sync + 'static {
    /// Runs `command` on `host`. Only a failure to reach the host is an error,
    /// a non-zero exit code is reported through the output.
    async fn run(&self, host: &str, command: &str, privileged: bool) -> Result<CommandOutput>;

    /// Runs `command` on `host` and returns its stdout, failing on a non-zero exit code.
    async fn run_checked(&self, host: &str, command: &str, privileged: bool) -> Result<String> {
        let output = self.run(host, command, privileged).await?;
        if !output.success() {
            return Err(RingError::RemoteCommandError {
                host: host.to_string(),
                command: command.to_string(),
                detail: format!(
                    "exit code {}, stderr: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }
        Ok(output.stdout)
    }
}

/// Executes commands through the local `ssh` client.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    user: Option<String>,
    identity_file: Option<PathBuf>,
}

impl SshExecutor {
    pub fn new(user: Option<String>, identity_file: Option<PathBuf>) -> Self {
        SshExecutor {
            user,
            identity_file,
        }
    }

    /// Options shared by every ssh invocation, also used as the rsync transport.
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
        ];
        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.display().to_string());
        }
        args
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn command(&self, host: &str, remote_cmd: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args());
        if let Some(user) = &self.user {
            cmd.arg("-l").arg(user);
        }
        cmd.arg(host).arg(remote_cmd);
        cmd
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, host: &str, command: &str, privileged: bool) -> Result<CommandOutput> {
        let remote_cmd = if privileged {
            format!("{} {}", SUDO, command)
        } else {
            command.to_string()
        };
        debug!(target = "remote", host, command = %remote_cmd, "running remote command");

        let output = self
            .command(host, &remote_cmd)
            .output()
            .await
            .map_err(|err| RingError::RemoteCommandError {
                host: host.to_string(),
                command: remote_cmd.clone(),
                detail: format!("failed to start ssh: {}", err),
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            // killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
